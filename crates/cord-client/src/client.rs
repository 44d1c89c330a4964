//! Logged-in client
//!
//! Owns the cache, the dispatcher, the REST client and one handle per
//! running shard. Entity operations live on the services returned by
//! [`Client::messages`], [`Client::members`] and friends.

use std::sync::Arc;
use std::time::Duration;

use cord_cache::{EntityCache, MessageCache};
use cord_common::{AccountType, ClientConfig};
use cord_core::{Activity, Event, EventKind, Scope, User, UserStatus};
use cord_gateway::dispatch::Listener;
use cord_gateway::{Dispatcher, HandlerRegistry, ListenerHandle, Shard, ShardConfig, ShardHandle, ShardInfo};
use cord_rest::RestClient;
use futures::future::select_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{ClientError, ClientResult};
use crate::services::{ChannelService, MemberService, MessageService, ServerService, UserService};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Pause between two shards' logins
const IDENTIFY_SPACING: Duration = Duration::from_secs(5);

/// Which shards `connect` starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShardSelection {
    /// Only `config.shard_index`
    Configured,
    /// Every shard of the total
    All,
}

pub struct Client {
    config: ClientConfig,
    cache: Arc<EntityCache>,
    dispatcher: Arc<Dispatcher>,
    rest: Arc<RestClient>,
    shards: Vec<ShardHandle>,
    sweeper: JoinHandle<()>,
}

impl Client {
    #[instrument(skip_all, fields(selection = ?selection))]
    pub(crate) async fn connect(
        mut config: ClientConfig,
        listeners: Vec<(EventKind, Scope, Listener)>,
        handlers: Arc<HandlerRegistry>,
        selection: ShardSelection,
    ) -> ClientResult<Self> {
        config.validate()?;
        let rest = Arc::new(RestClient::from_config(&config)?);
        let gateway_url = resolve_gateway(&mut config, &rest).await?;
        config.validate()?;

        let cache = EntityCache::new_shared(MessageCache::new(
            config.message_cache_capacity,
            config.message_cache_max_age,
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&cache));
        for (kind, scope, listener) in listeners {
            dispatcher.add_listener(kind, scope, move |event: &Event, cache: &EntityCache| {
                listener(event, cache);
            });
        }

        let indices: Vec<u32> = match selection {
            ShardSelection::Configured => vec![config.shard_index],
            ShardSelection::All => (0..config.shard_count).collect(),
        };

        let mut shards = Vec::with_capacity(indices.len());
        for (position, index) in indices.into_iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(IDENTIFY_SPACING).await;
            }
            let shard = ShardInfo::new(index, config.shard_count);
            let shard_config = ShardConfig::from_client_config(&config, shard, gateway_url.clone());
            let mut handle = Shard::new(shard_config, Arc::clone(&dispatcher))
                .with_rest(Arc::clone(&rest))
                .with_handlers(Arc::clone(&handlers))
                .spawn();

            // Dropping the handles on error aborts every shard started so far
            if config.wait_for_servers_on_startup {
                handle.wait_until_connected().await?;
            } else {
                handle.wait_until_ready().await?;
            }
            info!(shard = %shard, "Shard logged in");
            shards.push(handle);
        }

        let sweeper = spawn_sweeper(Arc::clone(cache.messages()));
        info!(
            shards = shards.len(),
            servers = cache.server_count(),
            "Client logged in"
        );

        Ok(Self {
            config,
            cache,
            dispatcher,
            rest,
            shards,
            sweeper,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    pub fn shards(&self) -> &[ShardHandle] {
        &self.shards
    }

    pub fn shard(&self, index: u32) -> ClientResult<&ShardHandle> {
        self.shards
            .iter()
            .find(|s| s.shard().index == index)
            .ok_or(ClientError::UnknownShard(index))
    }

    /// The account this client is logged in as
    pub fn yourself(&self) -> Option<User> {
        self.cache.yourself()
    }

    /// Listen to every event of a kind
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&Event, &EntityCache) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, listener)
    }

    /// Listen to events of a kind that concern one entity
    pub fn add_listener<F>(&self, kind: EventKind, scope: Scope, listener: F) -> ListenerHandle
    where
        F: Fn(&Event, &EntityCache) + Send + Sync + 'static,
    {
        self.dispatcher.add_listener(kind, scope, listener)
    }

    /// Set status and activity on every shard
    #[instrument(skip(self))]
    pub async fn update_presence(&self, status: UserStatus, activity: Option<Activity>) -> ClientResult<()> {
        for shard in &self.shards {
            shard.update_presence(status, activity.clone()).await?;
        }
        Ok(())
    }

    /// Heartbeat round trip of the first shard
    pub fn latency(&self) -> Option<Duration> {
        self.shards.first().and_then(ShardHandle::latency)
    }

    pub fn set_message_cache_capacity(&self, capacity: usize) {
        self.cache.messages().set_capacity(capacity);
    }

    pub fn set_message_cache_max_age(&self, max_age: Duration) {
        self.cache.messages().set_max_age(max_age);
    }

    pub fn messages(&self) -> MessageService<'_> {
        MessageService::new(self)
    }

    pub fn members(&self) -> MemberService<'_> {
        MemberService::new(self)
    }

    pub fn channels(&self) -> ChannelService<'_> {
        ChannelService::new(self)
    }

    pub fn servers(&self) -> ServerService<'_> {
        ServerService::new(self)
    }

    pub fn users(&self) -> UserService<'_> {
        UserService::new(self)
    }

    /// Resolve when any shard stops on its own, with that shard's outcome
    pub async fn closed(&mut self) -> ClientResult<()> {
        if self.shards.is_empty() {
            return Ok(());
        }
        let waits = self.shards.iter_mut().map(|s| Box::pin(s.closed()));
        let (result, index, _) = select_all(waits).await;
        debug!(position = index, "Shard session ended");
        result.map_err(ClientError::from)
    }

    /// Close every shard and stop the sweeper
    #[instrument(skip(self))]
    pub async fn disconnect(mut self) {
        self.sweeper.abort();
        for shard in std::mem::take(&mut self.shards) {
            let info = shard.shard();
            if let Err(e) = shard.shutdown().await {
                warn!(shard = %info, error = %e, "Shard stopped with an error");
            }
        }
        info!("Client disconnected");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("shards", &self.shards)
            .finish_non_exhaustive()
    }
}

/// Gateway url to connect to, filling in the recommended shard count
async fn resolve_gateway(config: &mut ClientConfig, rest: &RestClient) -> ClientResult<String> {
    if let Some(url) = &config.gateway_url {
        return Ok(url.clone());
    }
    if config.account_type == AccountType::Bot && config.use_recommended_shard_count {
        let info = rest.gateway_bot().await?;
        info!(shards = info.shards, "Using recommended shard count");
        config.shard_count = info.shards.max(1);
        return Ok(info.url);
    }
    Ok(rest.gateway_url().await?)
}

fn spawn_sweeper(messages: Arc<MessageCache>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            messages.sweep();
        }
    })
}
