//! # cord-cache
//!
//! In-memory cache of everything the client has seen.
//!
//! ## Features
//!
//! - **Entity cache**: servers, channels, users, roles and emojis keyed by id
//! - **Message cache**: bounded by capacity and age, swept periodically
//! - **History views**: per-channel message lists kept in sync with deletions
//!
//! ## Example
//!
//! ```ignore
//! use cord_cache::{EntityCache, MessageCache};
//!
//! let cache = EntityCache::new_shared(MessageCache::new(50, Duration::from_secs(12 * 3600)));
//! let server = cache.server(server_id);
//! let perms = cache.channel_permissions(channel_id, user_id);
//! ```

pub mod entity_cache;
pub mod history;
pub mod message_cache;

pub use entity_cache::{
    CacheSnapshot, EmojiDiff, EntityCache, MemberDiff, ServerInsert, ServerSnapshot,
};
pub use history::MessageHistory;
pub use message_cache::{MessageCache, MessageObserver, ObserverId, RemovalCause};
