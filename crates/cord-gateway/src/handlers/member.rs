//! GUILD_MEMBERS_CHUNK and GUILD_MEMBER_ADD / UPDATE / REMOVE

use async_trait::async_trait;
use cord_core::payloads::{
    MemberChunkPayload, MemberPayload, MemberRemovePayload, MemberUpdatePayload,
};
use cord_core::{DomainError, Event, Member, Snowflake};
use serde_json::Value;

use super::user::{apply_presence, user_changes};
use super::{parse, HandlerContext, HandlerResult, PacketHandler};

/// Make sure a membership is cached before an event is built on it
///
/// Uses the inline member object if the payload has one, otherwise asks
/// the REST API. Returns `false` if the membership stays unknown.
pub(super) async fn ensure_member(
    ctx: &HandlerContext,
    server_id: Snowflake,
    user_id: Snowflake,
    inline: Option<&MemberPayload>,
) -> bool {
    let cache = ctx.cache();
    if cache.is_member(server_id, user_id) {
        return true;
    }
    if !cache.contains_server(server_id) {
        return false;
    }

    let fetched;
    let payload = match inline {
        Some(payload) => payload,
        None => {
            let Some(rest) = ctx.rest() else {
                tracing::debug!(server_id = %server_id, user_id = %user_id, "Member not cached and no REST client");
                return false;
            };
            match rest.get_member(server_id, user_id).await {
                Ok(member) => {
                    fetched = member;
                    &fetched
                }
                Err(e) => {
                    tracing::warn!(server_id = %server_id, user_id = %user_id, error = %e, "Member backfill failed");
                    return false;
                }
            }
        }
    };

    cache.upsert_user(&payload.user);
    match cache.add_member(server_id, Member::from_payload(payload)) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(server_id = %server_id, error = %e, "Server vanished during backfill");
            false
        }
    }
}

/// Member list pages requested for large servers; fires nothing
pub struct MembersChunkHandler;

#[async_trait]
impl PacketHandler for MembersChunkHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let chunk: MemberChunkPayload = parse(payload)?;
        let cache = ctx.cache();
        if !cache.contains_server(chunk.guild_id) {
            tracing::debug!(server_id = %chunk.guild_id, "Member chunk for uncached server");
            return Ok(Vec::new());
        }

        for member in &chunk.members {
            cache.upsert_user(&member.user);
            cache.add_member(chunk.guild_id, Member::from_payload(member))?;
        }
        for presence in &chunk.presences {
            apply_presence(cache, presence);
        }
        tracing::debug!(
            server_id = %chunk.guild_id,
            members = chunk.members.len(),
            "Member chunk applied"
        );
        Ok(Vec::new())
    }
}

pub struct MemberAddHandler;

#[async_trait]
impl PacketHandler for MemberAddHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let member: MemberPayload = parse(payload)?;
        let Some(server_id) = member.guild_id else {
            tracing::warn!(user_id = %member.user.id, "Member join without server id");
            return Ok(Vec::new());
        };
        let cache = ctx.cache();
        cache.upsert_user(&member.user);

        match cache.member_joined(server_id, Member::from_payload(&member)) {
            Ok(true) => Ok(vec![Event::MemberJoin {
                server_id,
                user_id: member.user.id,
            }]),
            Ok(false) => Ok(Vec::new()),
            Err(DomainError::UnknownServer(_)) => {
                tracing::debug!(server_id = %server_id, "Member join for uncached server");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Nickname and role changes, plus name and avatar changes of the user
pub struct MemberUpdateHandler;

#[async_trait]
impl PacketHandler for MemberUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let update: MemberUpdatePayload = parse(payload)?;
        let server_id = update.guild_id;
        let user_id = update.user.id;
        let cache = ctx.cache();

        if !cache.contains_server(server_id) {
            tracing::debug!(server_id = %server_id, "Member update for uncached server");
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        if let Some(before) = cache.upsert_user(&update.user) {
            if let Some(after) = cache.user(user_id) {
                events.extend(user_changes(&before, &after));
            }
        }

        if !ensure_member(ctx, server_id, user_id, None).await {
            tracing::warn!(server_id = %server_id, user_id = %user_id, "Skipping update for unknown member");
            return Ok(events);
        }

        let roles = update.roles.iter().copied().collect();
        let Some(diff) = cache.update_member(server_id, user_id, update.nick.clone(), roles) else {
            return Ok(events);
        };

        if let Some(old) = diff.nickname {
            events.push(Event::UserChangeNickname {
                server_id,
                user_id,
                old,
                new: update.nick,
            });
        }
        events.extend(diff.roles_added.into_iter().map(|role_id| Event::UserRoleAdd {
            server_id,
            user_id,
            role_id,
        }));
        events.extend(diff.roles_removed.into_iter().map(|role_id| Event::UserRoleRemove {
            server_id,
            user_id,
            role_id,
        }));
        Ok(events)
    }
}

pub struct MemberRemoveHandler;

#[async_trait]
impl PacketHandler for MemberRemoveHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let removal: MemberRemovePayload = parse(payload)?;
        let server_id = removal.guild_id;
        let user_id = removal.user.id;
        let cache = ctx.cache();

        if !cache.contains_server(server_id) {
            return Ok(Vec::new());
        }
        cache.upsert_user(&removal.user);
        if cache.remove_member(server_id, user_id).is_none() {
            // Never cached (large server), the declared count still drops
            cache.update_server(server_id, |s| s.member_count = s.member_count.saturating_sub(1));
        }
        Ok(vec![Event::MemberLeave { server_id, user_id }])
    }
}
