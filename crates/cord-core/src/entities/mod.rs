//! Domain entities - the objects the cache owns

mod channel;
mod embed;
mod emoji;
mod message;
mod presence;
mod role;
mod server;
mod user;

pub use channel::{
    Channel, ChannelCategory, ChannelType, GroupChannel, Overwrites, PrivateChannel,
    ServerTextChannel, ServerVoiceChannel,
};
pub use embed::{Attachment, Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedMedia};
pub use emoji::{CustomEmoji, ReactionEmoji};
pub use message::{Message, MessageAuthor, Reaction, WebhookAuthor};
pub use presence::{Activity, ActivityType, Presence, UserStatus};
pub use role::Role;
pub use server::{Member, Server};
pub use user::User;
