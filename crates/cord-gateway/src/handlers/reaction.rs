//! MESSAGE_REACTION_ADD / REMOVE / REMOVE_ALL
//!
//! Reactions on messages outside the message cache are dropped.

use async_trait::async_trait;
use cord_core::payloads::{ReactionEventPayload, ReactionRemoveAllPayload};
use cord_core::{Event, ReactionEmoji};
use serde_json::Value;

use super::member::ensure_member;
use super::{parse, HandlerContext, HandlerResult, PacketHandler};

pub struct ReactionAddHandler;

#[async_trait]
impl PacketHandler for ReactionAddHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let reaction: ReactionEventPayload = parse(payload)?;
        let cache = ctx.cache();
        if !cache.messages().contains(reaction.message_id) {
            tracing::trace!(message_id = %reaction.message_id, "Reaction on uncached message");
            return Ok(Vec::new());
        }

        if let Some(server_id) = reaction.guild_id {
            if !ensure_member(ctx, server_id, reaction.user_id, reaction.member.as_ref()).await {
                tracing::warn!(
                    server_id = %server_id,
                    user_id = %reaction.user_id,
                    "Skipping reaction of unknown member"
                );
                return Ok(Vec::new());
            }
        }

        let emoji = ReactionEmoji::from(&reaction.emoji);
        let is_self = cache.yourself_id() == Some(reaction.user_id);
        let added = cache
            .messages()
            .update(reaction.message_id, |m| m.add_reaction(&emoji, reaction.user_id, is_self));
        Ok(match added {
            Some(true) => vec![Event::ReactionAdd {
                message_id: reaction.message_id,
                channel_id: reaction.channel_id,
                server_id: reaction.guild_id,
                user_id: reaction.user_id,
                emoji,
            }],
            _ => Vec::new(),
        })
    }
}

pub struct ReactionRemoveHandler;

#[async_trait]
impl PacketHandler for ReactionRemoveHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let reaction: ReactionEventPayload = parse(payload)?;
        let cache = ctx.cache();
        let emoji = ReactionEmoji::from(&reaction.emoji);
        let is_self = cache.yourself_id() == Some(reaction.user_id);

        let removed = cache
            .messages()
            .update(reaction.message_id, |m| m.remove_reaction(&emoji, reaction.user_id, is_self));
        Ok(match removed {
            Some(true) => vec![Event::ReactionRemove {
                message_id: reaction.message_id,
                channel_id: reaction.channel_id,
                server_id: reaction.guild_id,
                user_id: reaction.user_id,
                emoji,
            }],
            _ => Vec::new(),
        })
    }
}

pub struct ReactionRemoveAllHandler;

#[async_trait]
impl PacketHandler for ReactionRemoveAllHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let clear: ReactionRemoveAllPayload = parse(payload)?;
        let cleared = ctx
            .cache()
            .messages()
            .update(clear.message_id, |m| m.remove_all_reactions());
        Ok(match cleared {
            Some(()) => vec![Event::ReactionRemoveAll {
                message_id: clear.message_id,
                channel_id: clear.channel_id,
                server_id: clear.guild_id,
            }],
            None => Vec::new(),
        })
    }
}
