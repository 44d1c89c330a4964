//! Wire payloads
//!
//! Serde models of the JSON bodies the remote side sends inside dispatch
//! packets and REST responses. Fields the library does not track are
//! ignored during deserialization.

mod channel;
mod message;
mod server;
mod user;

pub use channel::{ChannelPayload, OverwriteKind, OverwritePayload, TypingStartPayload};
pub use message::{
    MessageDeleteBulkPayload, MessageDeletePayload, MessagePayload, MessageUpdatePayload,
    PartialEmojiPayload, ReactionCountPayload, ReactionEventPayload, ReactionRemoveAllPayload,
};
pub use server::{
    EmojiPayload, GuildEmojisUpdatePayload, GuildPayload, MemberChunkPayload, MemberPayload,
    MemberRemovePayload, MemberUpdatePayload, RoleDeletePayload, RoleEventPayload, RolePayload,
    UnavailableGuildPayload,
};
pub use user::{
    ActivityPayload, PartialUserPayload, PresencePayload, ReadyPayload, UserPayload,
};
