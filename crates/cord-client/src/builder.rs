//! Client builder

use std::sync::Arc;
use std::time::Duration;

use cord_cache::EntityCache;
use cord_common::{AccountType, ClientConfig};
use cord_core::{Event, EventKind, Intents, Scope};
use cord_gateway::dispatch::Listener;
use cord_gateway::HandlerRegistry;

use crate::client::{Client, ShardSelection};
use crate::error::ClientResult;

/// Programmatic counterpart of [`ClientConfig::from_env`]
///
/// Listeners added here are registered before the first shard connects,
/// so they see READY and the initial server events.
pub struct ClientBuilder {
    config: ClientConfig,
    listeners: Vec<(EventKind, Scope, Listener)>,
    handlers: Option<Arc<HandlerRegistry>>,
}

impl ClientBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(token))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
            handlers: None,
        }
    }

    /// Load `.env` and the `CORD_*` environment variables
    pub fn from_env() -> ClientResult<Self> {
        Ok(Self::from_config(ClientConfig::from_env()?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.config.account_type = account_type;
        self
    }

    pub fn current_shard(mut self, index: u32) -> Self {
        self.config.shard_index = index;
        self
    }

    pub fn total_shards(mut self, count: u32) -> Self {
        self.config.shard_count = count;
        self.config.use_recommended_shard_count = false;
        self
    }

    /// Ask the gateway how many shards to run
    pub fn recommended_total_shards(mut self) -> Self {
        self.config.use_recommended_shard_count = true;
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.config.proxy = Some(url.into());
        self
    }

    pub fn wait_for_servers_on_startup(mut self, wait: bool) -> Self {
        self.config.wait_for_servers_on_startup = wait;
        self
    }

    pub fn message_cache(mut self, capacity: usize, max_age: Duration) -> Self {
        self.config.message_cache_capacity = capacity;
        self.config.message_cache_max_age = max_age;
        self
    }

    pub fn intents(mut self, intents: Intents) -> Self {
        self.config.intents = intents;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    /// Skip the gateway url lookup
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway_url = Some(url.into());
        self
    }

    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.config.large_threshold = threshold;
        self
    }

    pub fn reconnect_policy(mut self, max_resume_attempts: u32, max_reconnect_attempts: u32) -> Self {
        self.config.max_resume_attempts = max_resume_attempts;
        self.config.max_reconnect_attempts = max_reconnect_attempts;
        self
    }

    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.backoff_base = base;
        self.config.backoff_max = max;
        self
    }

    /// Replace the packet handlers, e.g. to add one for a new event name
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(Arc::new(handlers));
        self
    }

    /// Listen to every event of a kind
    pub fn on<F>(self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&Event, &EntityCache) + Send + Sync + 'static,
    {
        self.listener(kind, Scope::Global, listener)
    }

    pub fn listener<F>(mut self, kind: EventKind, scope: Scope, listener: F) -> Self
    where
        F: Fn(&Event, &EntityCache) + Send + Sync + 'static,
    {
        self.listeners.push((kind, scope, Arc::new(listener)));
        self
    }

    /// Connect the configured shard
    pub async fn login(self) -> ClientResult<Client> {
        self.connect(ShardSelection::Configured).await
    }

    /// Connect every shard of the total, one after another
    pub async fn login_all_shards(self) -> ClientResult<Client> {
        self.connect(ShardSelection::All).await
    }

    async fn connect(self, selection: ShardSelection) -> ClientResult<Client> {
        let handlers = self
            .handlers
            .unwrap_or_else(|| Arc::new(HandlerRegistry::with_defaults()));
        Client::connect(self.config, self.listeners, handlers, selection).await
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_config() {
        let builder = ClientBuilder::new("token")
            .account_type(AccountType::Bearer)
            .current_shard(1)
            .total_shards(4)
            .proxy("http://proxy.local:3128")
            .wait_for_servers_on_startup(false)
            .message_cache(10, Duration::from_secs(60))
            .gateway_url("ws://127.0.0.1:9000");
        let config = builder.config();
        assert_eq!(config.account_type, AccountType::Bearer);
        assert_eq!((config.shard_index, config.shard_count), (1, 4));
        assert!(!config.use_recommended_shard_count);
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.local:3128"));
        assert!(!config.wait_for_servers_on_startup);
        assert_eq!(config.message_cache_capacity, 10);
        assert_eq!(config.gateway_url.as_deref(), Some("ws://127.0.0.1:9000"));
    }

    #[test]
    fn test_recommended_shards_flag() {
        let builder = ClientBuilder::new("token").total_shards(2).recommended_total_shards();
        assert!(builder.config().use_recommended_shard_count);
    }

    #[test]
    fn test_listeners_are_collected() {
        let builder = ClientBuilder::new("token")
            .on(EventKind::Ready, |_, _| {})
            .listener(EventKind::MessageCreate, Scope::Global, |_, _| {});
        assert_eq!(builder.listeners.len(), 2);
    }
}
