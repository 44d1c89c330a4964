//! Message history views
//!
//! A history holds the messages fetched for one channel. It stays
//! registered with the message cache while alive, so deleted messages
//! disappear from it; evicted messages stay.

use std::collections::BTreeMap;
use std::sync::Arc;

use cord_core::{Message, Snowflake};
use parking_lot::RwLock;

use crate::message_cache::{MessageCache, MessageObserver, ObserverId, RemovalCause};

struct HistoryView {
    channel_id: Snowflake,
    messages: RwLock<BTreeMap<Snowflake, Message>>,
}

impl MessageObserver for HistoryView {
    fn on_message_removed(&self, message: &Message, cause: RemovalCause) {
        if cause == RemovalCause::Deleted && message.channel_id == self.channel_id {
            self.messages.write().remove(&message.id);
        }
    }
}

/// Messages of one channel, ordered oldest first
///
/// Dropping the history unregisters it from the cache.
pub struct MessageHistory {
    view: Arc<HistoryView>,
    cache: Arc<MessageCache>,
    observer: ObserverId,
}

impl MessageHistory {
    pub fn new(cache: Arc<MessageCache>, channel_id: Snowflake, messages: Vec<Message>) -> Self {
        let view = Arc::new(HistoryView {
            channel_id,
            messages: RwLock::new(messages.into_iter().map(|m| (m.id, m)).collect()),
        });
        let observer = cache.register_observer(view.clone());
        Self {
            view,
            cache,
            observer,
        }
    }

    pub fn channel_id(&self) -> Snowflake {
        self.view.channel_id
    }

    pub fn len(&self) -> usize {
        self.view.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.messages.read().is_empty()
    }

    pub fn get(&self, id: Snowflake) -> Option<Message> {
        self.view.messages.read().get(&id).cloned()
    }

    /// Snapshot of the messages, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.view.messages.read().values().cloned().collect()
    }

    pub fn newest(&self) -> Option<Message> {
        self.view.messages.read().values().next_back().cloned()
    }

    pub fn oldest(&self) -> Option<Message> {
        self.view.messages.read().values().next().cloned()
    }
}

impl Drop for MessageHistory {
    fn drop(&mut self) {
        self.cache.unregister_observer(self.observer);
    }
}

impl std::fmt::Debug for MessageHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHistory")
            .field("channel_id", &self.view.channel_id)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_cache::tests::message;
    use std::time::Duration;

    #[test]
    fn test_deleted_messages_leave_history() {
        let cache = Arc::new(MessageCache::new(1, Duration::from_secs(60)));
        for id in 1..=3 {
            cache.insert(message(id, 20));
        }
        let history = MessageHistory::new(
            cache.clone(),
            Snowflake::new(20),
            (1..=3).map(|id| message(id, 20)).collect(),
        );
        assert_eq!(history.len(), 3);

        // Eviction keeps the history copy
        cache.sweep();
        assert_eq!(history.len(), 3);

        cache.insert(message(3, 20));
        cache.remove(Snowflake::new(3));
        assert_eq!(history.len(), 2);
        assert_eq!(history.newest().map(|m| m.id), Some(Snowflake::new(2)));
        assert_eq!(history.oldest().map(|m| m.id), Some(Snowflake::new(1)));
    }

    #[test]
    fn test_drop_unregisters() {
        let cache = Arc::new(MessageCache::new(10, Duration::from_secs(60)));
        let history = MessageHistory::new(cache.clone(), Snowflake::new(20), Vec::new());
        assert_eq!(cache.observer_count(), 1);
        assert!(history.is_empty());
        drop(history);
        assert_eq!(cache.observer_count(), 0);
    }
}
