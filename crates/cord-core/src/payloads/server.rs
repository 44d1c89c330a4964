//! Server, role, member and emoji payloads

use serde::{Deserialize, Serialize};

use super::{ChannelPayload, PresencePayload, UserPayload};
use crate::value_objects::{Permissions, Snowflake};

/// Server object (GUILD_CREATE, GUILD_UPDATE, REST)
///
/// GUILD_UPDATE omits the member, channel and presence lists, so every
/// collection defaults to empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildPayload {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub owner_id: Snowflake,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub roles: Vec<RolePayload>,
    #[serde(default)]
    pub emojis: Vec<EmojiPayload>,
    #[serde(default)]
    pub channels: Vec<ChannelPayload>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub presences: Vec<PresencePayload>,
}

/// Server stub from READY or an outage GUILD_DELETE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuildPayload {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// Role object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePayload {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

/// GUILD_ROLE_CREATE / GUILD_ROLE_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEventPayload {
    pub guild_id: Snowflake,
    pub role: RolePayload,
}

/// GUILD_ROLE_DELETE payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleDeletePayload {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

/// Server member object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPayload {
    pub user: UserPayload,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<String>,
    /// Only present on GUILD_MEMBER_ADD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

/// GUILD_MEMBER_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberUpdatePayload {
    pub guild_id: Snowflake,
    pub user: UserPayload,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

/// GUILD_MEMBER_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRemovePayload {
    pub guild_id: Snowflake,
    pub user: UserPayload,
}

/// GUILD_MEMBERS_CHUNK payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberChunkPayload {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub presences: Vec<PresencePayload>,
}

/// Custom emoji object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiPayload {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub require_colons: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub animated: bool,
}

/// GUILD_EMOJIS_UPDATE payload, always the complete emoji list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildEmojisUpdatePayload {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub emojis: Vec<EmojiPayload>,
}
