//! Listener registry
//!
//! Listeners are keyed by event kind and scope. An event reaches every
//! listener registered for its kind at any of its scopes, once each, in
//! registration order. Listeners run after the cache was updated and see
//! the post-mutation state through the cache reference they are given.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use cord_cache::EntityCache;
use cord_core::{Event, EventKind, Scope};
use parking_lot::RwLock;

/// Callback invoked for a dispatched event
pub type Listener = Arc<dyn Fn(&Event, &EntityCache) + Send + Sync>;

/// Registration id; increases with registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Listener,
}

/// Fan-out of domain events to registered listeners
pub struct Dispatcher {
    cache: Arc<EntityCache>,
    listeners: RwLock<HashMap<(EventKind, Scope), Vec<Registration>>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(cache: Arc<EntityCache>) -> Arc<Self> {
        Arc::new(Self {
            cache,
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Register a listener for one event kind at a scope
    pub fn add_listener<F>(self: &Arc<Self>, kind: EventKind, scope: Scope, listener: F) -> ListenerHandle
    where
        F: Fn(&Event, &EntityCache) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry((kind, scope))
            .or_default()
            .push(Registration {
                id,
                listener: Arc::new(listener),
            });
        tracing::trace!(kind = %kind, scope = ?scope, id = id.0, "Listener registered");

        ListenerHandle {
            id,
            kind,
            scope,
            dispatcher: Arc::downgrade(self),
        }
    }

    /// Register a global listener
    pub fn on<F>(self: &Arc<Self>, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&Event, &EntityCache) + Send + Sync + 'static,
    {
        self.add_listener(kind, Scope::Global, listener)
    }

    /// Remove a listener; `false` if it was already gone
    pub fn remove(&self, handle: &ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let key = (handle.kind, handle.scope);
        let Some(registrations) = listeners.get_mut(&key) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != handle.id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            listeners.remove(&key);
        }
        removed
    }

    /// Drop every listener attached to a scope
    pub fn remove_scope(&self, scope: Scope) -> usize {
        let mut listeners = self.listeners.write();
        let mut removed = 0;
        listeners.retain(|(_, s), registrations| {
            if *s == scope {
                removed += registrations.len();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }

    /// Invoke every matching listener
    ///
    /// The registry lock is released before listeners run, so listeners
    /// may register or remove listeners. A panicking listener is logged and
    /// the remaining listeners still run. Listeners scoped to a deleted
    /// entity are dropped afterwards.
    pub fn dispatch(&self, event: &Event) {
        let kind = event.kind();
        let mut matched: Vec<(ListenerId, Listener)> = {
            let listeners = self.listeners.read();
            event
                .scopes()
                .into_iter()
                .filter_map(|scope| listeners.get(&(kind, scope)))
                .flatten()
                .map(|r| (r.id, Arc::clone(&r.listener)))
                .collect()
        };
        matched.sort_by_key(|(id, _)| *id);
        matched.dedup_by_key(|(id, _)| *id);

        tracing::trace!(kind = %kind, listeners = matched.len(), "Dispatching event");
        for (id, listener) in matched {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(event, &self.cache)));
            if let Err(panic) = outcome {
                tracing::error!(
                    kind = %kind,
                    listener = id.0,
                    panic = %panic_message(panic.as_ref()),
                    "Listener panicked"
                );
            }
        }

        for scope in event.retired_scopes() {
            let removed = self.remove_scope(scope);
            if removed > 0 {
                tracing::debug!(scope = ?scope, removed = removed, "Dropped listeners of deleted entity");
            }
        }
    }

    pub fn dispatch_all(&self, events: &[Event]) {
        for event in events {
            self.dispatch(event);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Returned by registration; removes the listener on request
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    kind: EventKind,
    scope: Scope,
    dispatcher: Weak<Dispatcher>,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn remove(&self) -> bool {
        self.dispatcher
            .upgrade()
            .is_some_and(|dispatcher| dispatcher.remove(self))
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
