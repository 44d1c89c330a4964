//! User, presence and READY payloads

use serde::{Deserialize, Serialize};

use super::{ChannelPayload, UnavailableGuildPayload};
use crate::entities::{ActivityType, UserStatus};
use crate::value_objects::Snowflake;

/// READY event payload
///
/// Sent after a successful Identify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// Gateway protocol version
    #[serde(default)]
    pub v: i32,

    /// The connected account
    pub user: UserPayload,

    /// Servers the account is in; all of them start out unavailable
    #[serde(default)]
    pub guilds: Vec<UnavailableGuildPayload>,

    /// Session id used for resuming
    pub session_id: String,

    /// Private channels, only sent to bearer accounts
    #[serde(default)]
    pub private_channels: Vec<ChannelPayload>,

    /// `[shard_index, shard_count]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,

    /// Host to use when resuming this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

/// Full user object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Snowflake,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

fn default_discriminator() -> String {
    "0".to_string()
}

/// User object where everything but the id may be missing
///
/// Presence updates only carry the fields that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUserPayload {
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: Option<bool>,
}

impl PartialUserPayload {
    /// Whether the payload carries enough to build a full user
    pub fn to_full(&self) -> Option<UserPayload> {
        Some(UserPayload {
            id: self.id,
            username: self.username.clone()?,
            discriminator: self
                .discriminator
                .clone()
                .unwrap_or_else(default_discriminator),
            avatar: self.avatar.clone(),
            bot: self.bot.unwrap_or(false),
        })
    }
}

impl From<UserPayload> for PartialUserPayload {
    fn from(user: UserPayload) -> Self {
        Self {
            id: user.id,
            username: Some(user.username),
            discriminator: Some(user.discriminator),
            avatar: user.avatar,
            bot: Some(user.bot),
        }
    }
}

/// Activity ("game") shown next to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// PRESENCE_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user: PartialUserPayload,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub status: UserStatus,
    /// Older gateway versions send a single activity here
    #[serde(default)]
    pub game: Option<ActivityPayload>,
    #[serde(default)]
    pub activities: Vec<ActivityPayload>,
}

impl PresencePayload {
    /// The activity to display: the first listed one, else `game`
    pub fn activity(&self) -> Option<&ActivityPayload> {
        self.activities.first().or(self.game.as_ref())
    }
}
