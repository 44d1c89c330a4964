//! Control payloads
//!
//! The `d` bodies of the non-dispatch opcodes.

use cord_core::payloads::ActivityPayload;
use cord_core::{Activity, Intents, Snowflake, UserStatus};
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    /// `[index, count]`
    pub shard: [u32; 2],
    pub intents: Intents,
    pub large_threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "cord".to_string(),
            device: "cord".to_string(),
        }
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    pub query: String,
    /// 0 asks for every member
    pub limit: u32,
}

impl RequestGuildMembersPayload {
    /// Ask for the complete member list
    pub fn all(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            query: String::new(),
            limit: 0,
        }
    }
}

/// Payload for op 3 (Presence Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix millis since idle
    pub since: Option<u64>,
    pub activities: Vec<ActivityPayload>,
    pub status: UserStatus,
    pub afk: bool,
}

impl PresenceUpdatePayload {
    pub fn new(status: UserStatus, activity: Option<Activity>) -> Self {
        Self {
            since: None,
            activities: activity.as_ref().map(ActivityPayload::from).into_iter().collect(),
            status,
            afk: false,
        }
    }
}
