//! # cord-core
//!
//! Domain layer containing snowflakes, permission and intent flags, the
//! entities the cache owns, wire payload models and the domain events
//! dispatched to listeners. This crate does no I/O.

pub mod entities;
pub mod error;
pub mod events;
pub mod payloads;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Activity, ActivityType, Attachment, Channel, ChannelCategory, ChannelType, CustomEmoji, Embed,
    GroupChannel, Member, Message, MessageAuthor, Overwrites, Presence, PrivateChannel, Reaction,
    ReactionEmoji, Role, Server, ServerTextChannel, ServerVoiceChannel, User, UserStatus,
    WebhookAuthor,
};
pub use error::{DomainError, DomainResult};
pub use events::{Event, EventKind, Scope};
pub use value_objects::{
    Intents, OverwriteSubject, PermissionOverwrite, PermissionState, Permissions, Snowflake,
    SnowflakeGenerator, SnowflakeParseError,
};
