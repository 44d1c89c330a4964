//! Emoji - custom server emojis and reaction emojis

use std::fmt;

use crate::payloads::{EmojiPayload, PartialEmojiPayload};
use crate::value_objects::Snowflake;

/// Custom emoji uploaded to a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEmoji {
    pub id: Snowflake,
    pub server_id: Snowflake,
    pub name: String,
    pub animated: bool,
    pub managed: bool,
    pub require_colons: bool,
    /// Roles allowed to use the emoji; empty means everyone
    pub role_ids: Vec<Snowflake>,
}

impl CustomEmoji {
    pub fn from_payload(server_id: Snowflake, payload: &EmojiPayload) -> Self {
        Self {
            id: payload.id,
            server_id,
            name: payload.name.clone(),
            animated: payload.animated,
            managed: payload.managed,
            require_colons: payload.require_colons,
            role_ids: payload.roles.clone(),
        }
    }

    /// Mention string, `<:name:id>` or `<a:name:id>`
    pub fn mention_tag(&self) -> String {
        let prefix = if self.animated { "a" } else { "" };
        format!("<{prefix}:{}:{}>", self.name, self.id)
    }

    pub fn as_reaction(&self) -> ReactionEmoji {
        ReactionEmoji::Custom {
            id: self.id,
            name: self.name.clone(),
            animated: self.animated,
        }
    }
}

/// Emoji used in a reaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReactionEmoji {
    Unicode(String),
    Custom {
        id: Snowflake,
        name: String,
        animated: bool,
    },
}

impl ReactionEmoji {
    pub fn unicode(emoji: impl Into<String>) -> Self {
        Self::Unicode(emoji.into())
    }

    /// Form used in REST reaction routes: the raw unicode or `name:id`
    pub fn as_route_segment(&self) -> String {
        match self {
            Self::Unicode(emoji) => emoji.clone(),
            Self::Custom { id, name, .. } => format!("{name}:{id}"),
        }
    }

    /// Two reaction emojis match if their ids match, or for unicode, their text
    pub fn matches(&self, other: &ReactionEmoji) -> bool {
        match (self, other) {
            (Self::Unicode(a), Self::Unicode(b)) => a == b,
            (Self::Custom { id: a, .. }, Self::Custom { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl From<&PartialEmojiPayload> for ReactionEmoji {
    fn from(payload: &PartialEmojiPayload) -> Self {
        match payload.id {
            Some(id) => Self::Custom {
                id,
                name: payload.name.clone().unwrap_or_default(),
                animated: payload.animated,
            },
            None => Self::Unicode(payload.name.clone().unwrap_or_default()),
        }
    }
}

impl fmt::Display for ReactionEmoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode(emoji) => f.write_str(emoji),
            Self::Custom { id, name, animated } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{prefix}:{name}:{id}>")
            }
        }
    }
}
