//! Channel entity - a sum type over the channel variants
//!
//! Server channels carry a permission-overwrite table keyed by subject.
//! Categories keep an ordered list of their children's ids; the cache
//! maintains it as children are created, moved and deleted.

use std::collections::HashMap;

use crate::error::{DomainError, DomainResult};
use crate::payloads::ChannelPayload;
use crate::value_objects::{OverwriteSubject, PermissionOverwrite, Snowflake};

/// Channel type discriminant, as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelType {
    ServerText = 0,
    Private = 1,
    ServerVoice = 2,
    Group = 3,
    Category = 4,
}

impl ChannelType {
    /// Known channel type for a wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ServerText),
            1 => Some(Self::Private),
            2 => Some(Self::ServerVoice),
            3 => Some(Self::Group),
            4 => Some(Self::Category),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

pub type Overwrites = HashMap<OverwriteSubject, PermissionOverwrite>;

fn overwrites_from(payload: &ChannelPayload) -> Overwrites {
    payload
        .permission_overwrites
        .iter()
        .map(|o| {
            let overwrite = PermissionOverwrite::from(*o);
            (overwrite.subject, overwrite)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTextChannel {
    pub id: Snowflake,
    pub server_id: Snowflake,
    pub name: String,
    pub position: i32,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub category_id: Option<Snowflake>,
    pub overwrites: Overwrites,
}

impl ServerTextChannel {
    /// Mention string, `<#id>`
    pub fn mention_tag(&self) -> String {
        format!("<#{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVoiceChannel {
    pub id: Snowflake,
    pub server_id: Snowflake,
    pub name: String,
    pub position: i32,
    pub bitrate: u32,
    /// 0 means unlimited
    pub user_limit: u32,
    pub category_id: Option<Snowflake>,
    pub overwrites: Overwrites,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCategory {
    pub id: Snowflake,
    pub server_id: Snowflake,
    pub name: String,
    pub position: i32,
    pub overwrites: Overwrites,
    /// Child channel ids, ordered by position
    pub children: Vec<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateChannel {
    pub id: Snowflake,
    pub recipient_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChannel {
    pub id: Snowflake,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub owner_id: Option<Snowflake>,
    pub recipient_ids: Vec<Snowflake>,
}

/// Any channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    ServerText(ServerTextChannel),
    ServerVoice(ServerVoiceChannel),
    Category(ChannelCategory),
    Private(PrivateChannel),
    Group(GroupChannel),
}

impl Channel {
    /// Build a channel from its wire form
    ///
    /// `server_id` overrides the payload's `guild_id`, which is missing on
    /// channels nested in GUILD_CREATE.
    pub fn from_payload(payload: &ChannelPayload, server_id: Option<Snowflake>) -> DomainResult<Self> {
        let kind = ChannelType::from_u8(payload.kind).ok_or_else(|| {
            DomainError::invalid_payload(format!("unsupported channel type {}", payload.kind))
        })?;
        let server_id = server_id.or(payload.guild_id);
        let require_server = || {
            server_id.ok_or_else(|| {
                DomainError::invalid_payload(format!("server channel {} without server", payload.id))
            })
        };
        let name = || payload.name.clone().unwrap_or_default();

        let channel = match kind {
            ChannelType::ServerText => Self::ServerText(ServerTextChannel {
                id: payload.id,
                server_id: require_server()?,
                name: name(),
                position: payload.position,
                topic: payload.topic.clone(),
                nsfw: payload.nsfw,
                category_id: payload.parent_id,
                overwrites: overwrites_from(payload),
            }),
            ChannelType::ServerVoice => Self::ServerVoice(ServerVoiceChannel {
                id: payload.id,
                server_id: require_server()?,
                name: name(),
                position: payload.position,
                bitrate: payload.bitrate.unwrap_or(64_000),
                user_limit: payload.user_limit.unwrap_or(0),
                category_id: payload.parent_id,
                overwrites: overwrites_from(payload),
            }),
            ChannelType::Category => Self::Category(ChannelCategory {
                id: payload.id,
                server_id: require_server()?,
                name: name(),
                position: payload.position,
                overwrites: overwrites_from(payload),
                children: Vec::new(),
            }),
            ChannelType::Private => {
                let recipient = payload.recipients.first().ok_or_else(|| {
                    DomainError::invalid_payload(format!("private channel {} without recipient", payload.id))
                })?;
                Self::Private(PrivateChannel {
                    id: payload.id,
                    recipient_id: recipient.id,
                })
            }
            ChannelType::Group => Self::Group(GroupChannel {
                id: payload.id,
                name: payload.name.clone(),
                icon: payload.icon.clone(),
                owner_id: payload.owner_id,
                recipient_ids: payload.recipients.iter().map(|u| u.id).collect(),
            }),
        };
        Ok(channel)
    }

    pub fn id(&self) -> Snowflake {
        match self {
            Self::ServerText(c) => c.id,
            Self::ServerVoice(c) => c.id,
            Self::Category(c) => c.id,
            Self::Private(c) => c.id,
            Self::Group(c) => c.id,
        }
    }

    pub fn kind(&self) -> ChannelType {
        match self {
            Self::ServerText(_) => ChannelType::ServerText,
            Self::ServerVoice(_) => ChannelType::ServerVoice,
            Self::Category(_) => ChannelType::Category,
            Self::Private(_) => ChannelType::Private,
            Self::Group(_) => ChannelType::Group,
        }
    }

    /// Owning server, `None` for private and group channels
    pub fn server_id(&self) -> Option<Snowflake> {
        match self {
            Self::ServerText(c) => Some(c.server_id),
            Self::ServerVoice(c) => Some(c.server_id),
            Self::Category(c) => Some(c.server_id),
            Self::Private(_) | Self::Group(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::ServerText(c) => Some(&c.name),
            Self::ServerVoice(c) => Some(&c.name),
            Self::Category(c) => Some(&c.name),
            Self::Group(c) => c.name.as_deref(),
            Self::Private(_) => None,
        }
    }

    pub fn position(&self) -> Option<i32> {
        match self {
            Self::ServerText(c) => Some(c.position),
            Self::ServerVoice(c) => Some(c.position),
            Self::Category(c) => Some(c.position),
            Self::Private(_) | Self::Group(_) => None,
        }
    }

    /// Parent category of a text or voice channel
    pub fn category_id(&self) -> Option<Snowflake> {
        match self {
            Self::ServerText(c) => c.category_id,
            Self::ServerVoice(c) => c.category_id,
            _ => None,
        }
    }

    pub fn overwrites(&self) -> Option<&Overwrites> {
        match self {
            Self::ServerText(c) => Some(&c.overwrites),
            Self::ServerVoice(c) => Some(&c.overwrites),
            Self::Category(c) => Some(&c.overwrites),
            Self::Private(_) | Self::Group(_) => None,
        }
    }

    /// Whether messages can be sent to this channel
    pub fn is_text(&self) -> bool {
        matches!(self, Self::ServerText(_) | Self::Private(_) | Self::Group(_))
    }

    pub fn as_server_text_channel(&self) -> Option<&ServerTextChannel> {
        match self {
            Self::ServerText(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_server_voice_channel(&self) -> Option<&ServerVoiceChannel> {
        match self {
            Self::ServerVoice(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&ChannelCategory> {
        match self {
            Self::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_category_mut(&mut self) -> Option<&mut ChannelCategory> {
        match self {
            Self::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_private_channel(&self) -> Option<&PrivateChannel> {
        match self {
            Self::Private(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_group_channel(&self) -> Option<&GroupChannel> {
        match self {
            Self::Group(c) => Some(c),
            _ => None,
        }
    }

    /// Replace this channel's attributes with an updated version
    ///
    /// A category keeps its child list; children are tracked by the cache,
    /// not by the payload.
    pub fn apply(&mut self, updated: Channel) {
        let children = self.as_category().map(|c| c.children.clone());
        *self = updated;
        if let (Some(children), Some(category)) = (children, self.as_category_mut()) {
            category.children = children;
        }
    }
}
