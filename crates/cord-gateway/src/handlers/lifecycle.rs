//! READY and RESUMED

use std::collections::HashSet;

use async_trait::async_trait;
use cord_core::payloads::ReadyPayload;
use cord_core::{Channel, Event, Snowflake};
use serde_json::Value;

use super::{parse, HandlerContext, HandlerResult, PacketHandler};

/// Records the connected account and the servers to expect
///
/// Every listed server that is not cached yet goes into the unavailable
/// set until its GUILD_CREATE arrives. Cached servers of this shard that
/// READY no longer lists were left while disconnected.
pub struct ReadyHandler;

#[async_trait]
impl PacketHandler for ReadyHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let ready: ReadyPayload = parse(payload)?;
        let cache = ctx.cache();
        let shard = ctx.shard();

        cache.set_yourself(&ready.user);

        let listed: HashSet<Snowflake> = ready.guilds.iter().map(|g| g.id).collect();
        for id in &listed {
            if !cache.contains_server(*id) {
                cache.add_unavailable(*id);
            }
        }

        let mut events = vec![Event::Ready {
            shard: shard.index,
            session_id: ready.session_id.clone(),
        }];

        for id in cache.server_ids() {
            if shard.owns(id) && !listed.contains(&id) {
                if let Some(server) = cache.remove_server(id) {
                    tracing::info!(shard = %shard, server_id = %id, "Server left while disconnected");
                    events.push(Event::ServerLeave { server });
                }
            }
        }
        for id in cache.unavailable_servers() {
            if shard.owns(id) && !listed.contains(&id) {
                cache.forget_unavailable(id);
            }
        }

        for payload in &ready.private_channels {
            for recipient in &payload.recipients {
                cache.upsert_user(recipient);
            }
            match Channel::from_payload(payload, None) {
                Ok(channel) => {
                    cache.insert_channel(channel)?;
                }
                Err(e) => {
                    tracing::warn!(channel_id = %payload.id, error = %e, "Skipping private channel");
                }
            }
        }

        tracing::info!(
            shard = %shard,
            user = %ready.user.username,
            servers = listed.len(),
            "Session ready"
        );
        Ok(events)
    }
}

pub struct ResumedHandler;

#[async_trait]
impl PacketHandler for ResumedHandler {
    async fn handle(&self, _payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        tracing::info!(shard = %ctx.shard(), "Session resumed");
        Ok(vec![Event::Resumed {
            shard: ctx.shard().index,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use crate::handlers::{HandlerRegistry, ServerCreateHandler};
    use serde_json::json;

    #[tokio::test]
    async fn test_ready_marks_servers_unavailable() {
        let (ctx, _rx) = context();
        let events = ReadyHandler.handle(ready_json(&[10, 11]), &ctx).await.unwrap();

        assert_eq!(
            events,
            vec![Event::Ready {
                shard: 0,
                session_id: "session-1".into()
            }]
        );
        assert_eq!(ctx.cache().yourself_id(), Some(Snowflake::new(1)));
        assert!(ctx.cache().is_unavailable(Snowflake::new(10)));
        assert!(ctx.cache().is_unavailable(Snowflake::new(11)));
        assert_eq!(ctx.cache().server_count(), 0);
    }

    #[tokio::test]
    async fn test_ready_drops_servers_no_longer_listed() {
        let (ctx, _rx) = context();
        ServerCreateHandler.handle(server_json(), &ctx).await.unwrap();

        let events = ReadyHandler.handle(ready_json(&[11]), &ctx).await.unwrap();
        assert!(matches!(&events[1], Event::ServerLeave { server } if server.id == Snowflake::new(10)));
        assert!(!ctx.cache().contains_server(Snowflake::new(10)));
        assert!(ctx.cache().channel(Snowflake::new(20)).is_none());
    }

    #[tokio::test]
    async fn test_ready_keeps_cached_servers_available() {
        let (ctx, _rx) = context();
        ServerCreateHandler.handle(server_json(), &ctx).await.unwrap();
        ReadyHandler.handle(ready_json(&[10]), &ctx).await.unwrap();
        assert!(ctx.cache().contains_server(Snowflake::new(10)));
        assert!(!ctx.cache().is_unavailable(Snowflake::new(10)));
    }

    #[tokio::test]
    async fn test_ready_caches_private_channels() {
        let (ctx, _rx) = context();
        let mut ready = ready_json(&[]);
        ready["private_channels"] = json!([
            {"id": "90", "type": 1, "recipients": [{"id": "5", "username": "alice"}]}
        ]);
        HandlerRegistry::with_defaults().handle("READY", ready, &ctx).await.unwrap();

        let channel = ctx.cache().private_channel_with(Snowflake::new(5)).unwrap();
        assert_eq!(channel.id(), Snowflake::new(90));
        assert_eq!(ctx.cache().user(Snowflake::new(5)).unwrap().name, "alice");
    }

    #[tokio::test]
    async fn test_resumed() {
        let (ctx, _rx) = context();
        let events = ResumedHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(events, vec![Event::Resumed { shard: 0 }]);
    }
}
