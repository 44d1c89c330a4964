//! GUILD_CREATE, GUILD_UPDATE, GUILD_DELETE and GUILD_EMOJIS_UPDATE

use async_trait::async_trait;
use cord_cache::{ServerInsert, ServerSnapshot};
use cord_core::payloads::{GuildEmojisUpdatePayload, GuildPayload, UnavailableGuildPayload};
use cord_core::{Channel, CustomEmoji, Event, Member, Role, Server};
use serde::Deserialize;
use serde_json::Value;

use super::user::apply_presence;
use super::{parse, HandlerContext, HandlerResult, PacketHandler};
use crate::protocol::{GatewayMessage, RequestGuildMembersPayload};

/// Builds the complete server off-cache, then publishes it in one step
///
/// Users are upserted first, then the snapshot links categories before
/// children and resolves member role lists against the server's roles.
/// Presences are applied before the server becomes visible.
pub struct ServerCreateHandler;

#[async_trait]
impl PacketHandler for ServerCreateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let cache = ctx.cache();
        let stub = UnavailableGuildPayload::deserialize(&payload)?;
        if stub.unavailable {
            tracing::debug!(server_id = %stub.id, "Server is unavailable");
            cache.add_unavailable(stub.id);
            return Ok(Vec::new());
        }
        let guild: GuildPayload = parse(payload)?;

        for member in &guild.members {
            cache.upsert_user(&member.user);
        }

        let mut server = Server::from_payload(&guild);
        server.members = guild
            .members
            .iter()
            .map(|m| (m.user.id, Member::from_payload(m)))
            .collect();

        let channels: Vec<Channel> = guild
            .channels
            .iter()
            .filter_map(|payload| match Channel::from_payload(payload, Some(guild.id)) {
                Ok(channel) => Some(channel),
                Err(e) => {
                    tracing::warn!(server_id = %guild.id, channel_id = %payload.id, error = %e, "Skipping channel");
                    None
                }
            })
            .collect();
        let roles: Vec<Role> = guild
            .roles
            .iter()
            .map(|r| Role::from_payload(guild.id, r))
            .collect();
        let emojis: Vec<CustomEmoji> = guild
            .emojis
            .iter()
            .map(|e| CustomEmoji::from_payload(guild.id, e))
            .collect();

        let snapshot = ServerSnapshot::new(server, channels, roles, emojis);
        let needs_chunk = snapshot.server().needs_member_chunk();

        for presence in &guild.presences {
            apply_presence(cache, presence);
        }

        let outcome = cache.insert_server(snapshot);
        tracing::debug!(
            shard = %ctx.shard(),
            server_id = %guild.id,
            outcome = ?outcome,
            members = guild.members.len(),
            "Server cached"
        );

        if needs_chunk {
            let request = GatewayMessage::request_guild_members(&RequestGuildMembersPayload::all(guild.id))?;
            tracing::debug!(server_id = %guild.id, "Requesting member chunks");
            ctx.send(request).await;
        }

        Ok(match outcome {
            ServerInsert::BecameAvailable => vec![Event::ServerBecomesAvailable { server_id: guild.id }],
            ServerInsert::Joined => vec![Event::ServerJoin { server_id: guild.id }],
            ServerInsert::Replaced => Vec::new(),
        })
    }
}

pub struct ServerUpdateHandler;

#[async_trait]
impl PacketHandler for ServerUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let guild: GuildPayload = parse(payload)?;
        let change = ctx.cache().update_server(guild.id, |server| {
            let old = server.clone();
            server.apply(&guild).then(|| (old, server.clone()))
        });
        match change {
            Some(Some((old, new))) => Ok(vec![Event::ServerUpdate { old, new }]),
            Some(None) => Ok(Vec::new()),
            None => {
                tracing::debug!(server_id = %guild.id, "Update for uncached server");
                Ok(Vec::new())
            }
        }
    }
}

/// Outage or leave, told apart by the `unavailable` flag
pub struct ServerDeleteHandler;

#[async_trait]
impl PacketHandler for ServerDeleteHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let stub: UnavailableGuildPayload = parse(payload)?;
        let cache = ctx.cache();

        if stub.unavailable {
            let was_cached = cache.mark_unavailable(stub.id).is_some();
            tracing::info!(server_id = %stub.id, "Server became unavailable");
            return Ok(if was_cached {
                vec![Event::ServerBecomesUnavailable { server_id: stub.id }]
            } else {
                Vec::new()
            });
        }

        cache.forget_unavailable(stub.id);
        match cache.remove_server(stub.id) {
            Some(server) => {
                tracing::info!(server_id = %stub.id, name = %server.name, "Left server");
                Ok(vec![Event::ServerLeave { server }])
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Replaces the server's full emoji list and reports the difference
pub struct EmojisUpdateHandler;

#[async_trait]
impl PacketHandler for EmojisUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let update: GuildEmojisUpdatePayload = parse(payload)?;
        let server_id = update.guild_id;
        let emojis = update
            .emojis
            .iter()
            .map(|e| CustomEmoji::from_payload(server_id, e))
            .collect();

        let Some(diff) = ctx.cache().replace_emojis(server_id, emojis) else {
            tracing::debug!(server_id = %server_id, "Emoji update for uncached server");
            return Ok(Vec::new());
        };

        let created = diff
            .created
            .into_iter()
            .map(|emoji_id| Event::EmojiCreate { server_id, emoji_id });
        let updated = diff
            .updated
            .into_iter()
            .map(|emoji_id| Event::EmojiUpdate { server_id, emoji_id });
        let deleted = diff.deleted.into_iter().map(|emoji| Event::EmojiDelete { emoji });
        Ok(created.chain(updated).chain(deleted).collect())
    }
}
