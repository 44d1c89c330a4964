//! CHANNEL_CREATE / UPDATE / DELETE

use async_trait::async_trait;
use cord_core::payloads::ChannelPayload;
use cord_core::{Channel, DomainError, Event};
use serde_json::Value;

use super::{parse, HandlerContext, HandlerResult, PacketHandler};

enum Upsert {
    Created(Channel),
    Updated { before: Channel, after: Channel },
    Skipped,
}

fn upsert_channel(ctx: &HandlerContext, payload: &ChannelPayload) -> HandlerResult<Upsert> {
    let cache = ctx.cache();
    let channel = match Channel::from_payload(payload, None) {
        Ok(channel) => channel,
        Err(e) => {
            tracing::debug!(channel_id = %payload.id, error = %e, "Ignoring channel");
            return Ok(Upsert::Skipped);
        }
    };
    for recipient in &payload.recipients {
        cache.upsert_user(recipient);
    }

    let id = channel.id();
    match cache.insert_channel(channel) {
        Ok(None) => Ok(cache.channel(id).map_or(Upsert::Skipped, Upsert::Created)),
        Ok(Some(before)) => Ok(cache
            .channel(id)
            .map_or(Upsert::Skipped, |after| Upsert::Updated { before, after })),
        Err(DomainError::UnknownServer(server_id)) => {
            tracing::debug!(server_id = %server_id, channel_id = %id, "Channel event for uncached server");
            Ok(Upsert::Skipped)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct ChannelCreateHandler;

#[async_trait]
impl PacketHandler for ChannelCreateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let payload: ChannelPayload = parse(payload)?;
        Ok(match upsert_channel(ctx, &payload)? {
            Upsert::Created(channel) => vec![Event::ChannelCreate {
                channel_id: channel.id(),
                server_id: channel.server_id(),
            }],
            Upsert::Updated { .. } | Upsert::Skipped => Vec::new(),
        })
    }
}

/// Fires only if an attribute actually changed
pub struct ChannelUpdateHandler;

#[async_trait]
impl PacketHandler for ChannelUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let payload: ChannelPayload = parse(payload)?;
        Ok(match upsert_channel(ctx, &payload)? {
            Upsert::Created(channel) => vec![Event::ChannelCreate {
                channel_id: channel.id(),
                server_id: channel.server_id(),
            }],
            Upsert::Updated { before, after } if before != after => vec![Event::ChannelUpdate {
                channel_id: after.id(),
                server_id: after.server_id(),
            }],
            Upsert::Updated { .. } | Upsert::Skipped => Vec::new(),
        })
    }
}

/// Removes the channel and its cached messages
pub struct ChannelDeleteHandler;

#[async_trait]
impl PacketHandler for ChannelDeleteHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let payload: ChannelPayload = parse(payload)?;
        Ok(match ctx.cache().remove_channel(payload.id) {
            Some(channel) => vec![Event::ChannelDelete { channel }],
            None => Vec::new(),
        })
    }
}
