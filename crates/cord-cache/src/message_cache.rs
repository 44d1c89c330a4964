//! Bounded message cache
//!
//! Messages are evicted only by `sweep()`, which the client runs on a fixed
//! interval. A sweep drops messages older than the max age, then the oldest
//! messages beyond the capacity. Messages flagged "cached forever" are
//! exempt from both. Explicit removal always removes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cord_core::{Message, Snowflake};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::Instant;

/// Why a message left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Deleted remotely or through the API
    Deleted,
    /// Dropped by a sweep
    Evicted,
}

/// Notified when messages leave the cache
pub trait MessageObserver: Send + Sync {
    fn on_message_removed(&self, message: &Message, cause: RemovalCause);
}

/// Registration id of an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct CachedMessage {
    message: Message,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    capacity: usize,
    max_age: Duration,
}

/// Message store with capacity and age limits
pub struct MessageCache {
    entries: DashMap<Snowflake, CachedMessage>,
    limits: RwLock<Limits>,
    observers: RwLock<HashMap<ObserverId, Arc<dyn MessageObserver>>>,
    next_observer: AtomicU64,
}

impl MessageCache {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limits: RwLock::new(Limits { capacity, max_age }),
            observers: RwLock::new(HashMap::new()),
            next_observer: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.limits.read().capacity
    }

    pub fn max_age(&self) -> Duration {
        self.limits.read().max_age
    }

    /// Takes effect on the next sweep
    pub fn set_capacity(&self, capacity: usize) {
        self.limits.write().capacity = capacity;
    }

    /// Takes effect on the next sweep
    pub fn set_max_age(&self, max_age: Duration) {
        self.limits.write().max_age = max_age;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: Snowflake) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: Snowflake) -> Option<Message> {
        self.entries.get(&id).map(|e| e.message.clone())
    }

    /// Insert or refresh a message
    ///
    /// A refreshed message keeps its insertion time and its forever flag.
    pub fn insert(&self, message: Message) {
        match self.entries.get_mut(&message.id) {
            Some(mut entry) => {
                let forever = entry.message.cached_forever || message.cached_forever;
                entry.message = message;
                entry.message.cached_forever = forever;
            }
            None => {
                self.entries.insert(
                    message.id,
                    CachedMessage {
                        message,
                        inserted_at: Instant::now(),
                    },
                );
            }
        }
    }

    /// Mutate a cached message in place
    pub fn update<R>(&self, id: Snowflake, f: impl FnOnce(&mut Message) -> R) -> Option<R> {
        self.entries.get_mut(&id).map(|mut e| f(&mut e.message))
    }

    /// Exempt a message from eviction, or make it evictable again
    pub fn set_cached_forever(&self, id: Snowflake, forever: bool) -> bool {
        self.update(id, |m| m.cached_forever = forever).is_some()
    }

    /// Remove a message regardless of its forever flag
    pub fn remove(&self, id: Snowflake) -> Option<Message> {
        let (_, entry) = self.entries.remove(&id)?;
        self.notify(&entry.message, RemovalCause::Deleted);
        Some(entry.message)
    }

    /// Remove every message of a channel
    pub fn remove_channel(&self, channel_id: Snowflake) -> usize {
        let ids: Vec<Snowflake> = self
            .entries
            .iter()
            .filter(|e| e.message.channel_id == channel_id)
            .map(|e| *e.key())
            .collect();
        ids.into_iter().filter(|id| self.remove(*id).is_some()).count()
    }

    pub fn ids(&self) -> std::collections::BTreeSet<Snowflake> {
        self.entries.iter().map(|e| *e.key()).collect()
    }

    /// Cached messages of a channel, oldest first
    pub fn messages_in(&self, channel_id: Snowflake) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .entries
            .iter()
            .filter(|e| e.message.channel_id == channel_id)
            .map(|e| e.message.clone())
            .collect();
        messages.sort_by_key(|m| m.id);
        messages
    }

    /// Evict aged and over-capacity messages
    ///
    /// Returns the number of evicted messages.
    pub fn sweep(&self) -> usize {
        let Limits { capacity, max_age } = *self.limits.read();
        let now = Instant::now();

        let mut evictable: Vec<(Instant, Snowflake)> = self
            .entries
            .iter()
            .filter(|e| !e.message.cached_forever)
            .map(|e| (e.inserted_at, *e.key()))
            .collect();
        evictable.sort_unstable();

        let expired = evictable
            .iter()
            .take_while(|(inserted_at, _)| now.saturating_duration_since(*inserted_at) >= max_age)
            .count();
        let overflow = evictable.len().saturating_sub(expired).saturating_sub(capacity);

        let mut evicted = 0;
        for (_, id) in evictable.into_iter().take(expired + overflow) {
            // The flag may have been set since the scan
            if let Some((_, entry)) = self.entries.remove_if(&id, |_, e| !e.message.cached_forever) {
                self.notify(&entry.message, RemovalCause::Evicted);
                evicted += 1;
            }
        }

        tracing::debug!(
            evicted = evicted,
            remaining = self.entries.len(),
            capacity = capacity,
            "Message cache swept"
        );
        evicted
    }

    pub fn register_observer(&self, observer: Arc<dyn MessageObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.write().insert(id, observer);
        id
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.write().remove(&id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    fn notify(&self, message: &Message, cause: RemovalCause) {
        let observers: Vec<Arc<dyn MessageObserver>> =
            self.observers.read().values().cloned().collect();
        for observer in observers {
            observer.on_message_removed(message, cause);
        }
    }
}

impl std::fmt::Debug for MessageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let limits = *self.limits.read();
        f.debug_struct("MessageCache")
            .field("len", &self.entries.len())
            .field("capacity", &limits.capacity)
            .field("max_age", &limits.max_age)
            .field("observers", &self.observer_count())
            .finish()
    }
}
