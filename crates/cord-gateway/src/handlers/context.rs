//! What a handler may touch while applying a packet

use std::sync::Arc;

use cord_cache::EntityCache;
use cord_core::Snowflake;
use cord_rest::RestClient;
use tokio::sync::mpsc;

use crate::protocol::GatewayMessage;

/// Index and count of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardInfo {
    pub index: u32,
    pub count: u32,
}

impl ShardInfo {
    pub const fn new(index: u32, count: u32) -> Self {
        Self { index, count }
    }

    /// Whether a server's events are delivered to this shard
    pub fn owns(&self, server_id: Snowflake) -> bool {
        let count = u64::from(self.count.max(1));
        (server_id.get() >> 22) % count == u64::from(self.index)
    }
}

impl std::fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// Shared state handed to every packet handler
#[derive(Clone)]
pub struct HandlerContext {
    cache: Arc<EntityCache>,
    rest: Option<Arc<RestClient>>,
    shard: ShardInfo,
    gateway: Option<mpsc::Sender<GatewayMessage>>,
}

impl HandlerContext {
    pub fn new(cache: Arc<EntityCache>, shard: ShardInfo) -> Self {
        Self {
            cache,
            rest: None,
            shard,
            gateway: None,
        }
    }

    /// Enable REST backfills
    pub fn with_rest(mut self, rest: Arc<RestClient>) -> Self {
        self.rest = Some(rest);
        self
    }

    /// Outbound queue of the current connection
    pub fn with_gateway(mut self, gateway: mpsc::Sender<GatewayMessage>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn cache_arc(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn rest(&self) -> Option<&RestClient> {
        self.rest.as_deref()
    }

    pub fn shard(&self) -> ShardInfo {
        self.shard
    }

    /// Queue a frame on the live connection; dropped if there is none
    pub async fn send(&self, message: GatewayMessage) {
        let Some(gateway) = &self.gateway else {
            tracing::debug!(shard = %self.shard, frame = %message, "No connection, frame dropped");
            return;
        };
        if gateway.send(message).await.is_err() {
            tracing::warn!(shard = %self.shard, "Connection writer gone, frame dropped");
        }
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("shard", &self.shard)
            .field("rest", &self.rest.is_some())
            .field("gateway", &self.gateway.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_owns() {
        // (id >> 22) % count
        let server = Snowflake::new(5 << 22);
        assert!(ShardInfo::new(1, 2).owns(server));
        assert!(!ShardInfo::new(0, 2).owns(server));
        assert!(ShardInfo::new(0, 1).owns(server));
        assert_eq!(ShardInfo::new(1, 2).to_string(), "1/2");
    }
}
