//! MESSAGE_CREATE / UPDATE / DELETE / DELETE_BULK

use async_trait::async_trait;
use cord_core::payloads::{
    MessageDeleteBulkPayload, MessageDeletePayload, MessagePayload, MessageUpdatePayload,
};
use cord_core::{Channel, Event, Message, Snowflake};
use serde_json::Value;

use super::{parse, HandlerContext, HandlerResult, PacketHandler};

/// Fetch the channel of a direct or group message the cache has not seen
///
/// A message does not say whether its channel is a DM or a group, so the
/// channel always comes from REST. Without a REST client the message is
/// skipped.
async fn ensure_direct_channel(ctx: &HandlerContext, message: &MessagePayload) -> bool {
    let cache = ctx.cache();
    let Some(rest) = ctx.rest() else {
        tracing::debug!(channel_id = %message.channel_id, "Direct channel not cached and no REST client");
        return false;
    };
    match rest.get_channel(message.channel_id).await {
        Ok(payload) => {
            for recipient in &payload.recipients {
                cache.upsert_user(recipient);
            }
            match Channel::from_payload(&payload, None) {
                Ok(channel) => cache.insert_channel(channel).is_ok(),
                Err(e) => {
                    tracing::debug!(channel_id = %payload.id, error = %e, "Unusable channel");
                    false
                }
            }
        }
        Err(e) => {
            tracing::warn!(channel_id = %message.channel_id, error = %e, "Channel backfill failed");
            false
        }
    }
}

pub struct MessageCreateHandler;

#[async_trait]
impl PacketHandler for MessageCreateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let message: MessagePayload = parse(payload)?;
        let cache = ctx.cache();

        if message.webhook_id.is_none() {
            cache.upsert_user(&message.author);
        }

        if !cache.contains_channel(message.channel_id) {
            let resolved = message.guild_id.is_none() && ensure_direct_channel(ctx, &message).await;
            if !resolved {
                tracing::debug!(channel_id = %message.channel_id, "Message in uncached channel");
                return Ok(Vec::new());
            }
        }

        if cache.messages().contains(message.id) {
            return Ok(Vec::new());
        }
        cache.messages().insert(Message::from(&message));
        Ok(vec![Event::MessageCreate {
            message_id: message.id,
            channel_id: message.channel_id,
            server_id: message.guild_id,
        }])
    }
}

/// Edits of uncached messages are dropped; embed-only edits fire nothing
pub struct MessageUpdateHandler;

#[async_trait]
impl PacketHandler for MessageUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let update: MessageUpdatePayload = parse(payload)?;
        match ctx.cache().messages().update(update.id, |m| m.apply_update(&update)) {
            Some(Some(old)) => Ok(vec![Event::MessageEdit {
                message_id: update.id,
                channel_id: update.channel_id,
                server_id: update.guild_id,
                old_content: Some(old),
            }]),
            Some(None) => Ok(Vec::new()),
            None => {
                tracing::trace!(message_id = %update.id, "Edit of uncached message");
                Ok(Vec::new())
            }
        }
    }
}

fn deleted(ctx: &HandlerContext, message_id: Snowflake, channel_id: Snowflake, server_id: Option<Snowflake>) -> Event {
    Event::MessageDelete {
        message_id,
        channel_id,
        server_id,
        message: ctx.cache().messages().remove(message_id).map(Box::new),
    }
}

/// Always fires; the event carries the message if it was cached
pub struct MessageDeleteHandler;

#[async_trait]
impl PacketHandler for MessageDeleteHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let delete: MessageDeletePayload = parse(payload)?;
        Ok(vec![deleted(ctx, delete.id, delete.channel_id, delete.guild_id)])
    }
}

pub struct MessageDeleteBulkHandler;

#[async_trait]
impl PacketHandler for MessageDeleteBulkHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let bulk: MessageDeleteBulkPayload = parse(payload)?;
        Ok(bulk
            .ids
            .iter()
            .map(|id| deleted(ctx, *id, bulk.channel_id, bulk.guild_id))
            .collect())
    }
}
