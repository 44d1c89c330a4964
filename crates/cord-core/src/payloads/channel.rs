//! Channel payloads

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::UserPayload;
use crate::value_objects::{OverwriteSubject, PermissionOverwrite, Permissions, Snowflake};

/// Channel object (CHANNEL_CREATE/UPDATE/DELETE, GUILD_CREATE, REST)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub id: Snowflake,
    /// Raw channel type number
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permission_overwrites: Vec<OverwritePayload>,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub user_limit: Option<u32>,
    #[serde(default)]
    pub recipients: Vec<UserPayload>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Permission overwrite object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwritePayload {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl From<OverwritePayload> for PermissionOverwrite {
    fn from(payload: OverwritePayload) -> Self {
        let subject = match payload.kind {
            OverwriteKind::Role => OverwriteSubject::Role(payload.id),
            OverwriteKind::Member => OverwriteSubject::User(payload.id),
        };
        PermissionOverwrite::new(subject, payload.allow, payload.deny)
    }
}

/// Overwrite target type
///
/// Sent as `0`/`1` by current API versions and as `"role"`/`"member"` by
/// older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteKind {
    Role,
    Member,
}

impl Serialize for OverwriteKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(match self {
            Self::Role => 0,
            Self::Member => 1,
        })
    }
}

impl<'de> Deserialize<'de> for OverwriteKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct KindVisitor;

        impl Visitor<'_> for KindVisitor {
            type Value = OverwriteKind;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("0, 1, \"role\" or \"member\"")
            }

            fn visit_u64<E>(self, value: u64) -> Result<OverwriteKind, E>
            where
                E: de::Error,
            {
                match value {
                    0 => Ok(OverwriteKind::Role),
                    1 => Ok(OverwriteKind::Member),
                    other => Err(de::Error::custom(format!("unknown overwrite type {other}"))),
                }
            }

            fn visit_i64<E>(self, value: i64) -> Result<OverwriteKind, E>
            where
                E: de::Error,
            {
                let value = u64::try_from(value)
                    .map_err(|_| de::Error::custom("negative overwrite type"))?;
                self.visit_u64(value)
            }

            fn visit_str<E>(self, value: &str) -> Result<OverwriteKind, E>
            where
                E: de::Error,
            {
                match value {
                    "role" => Ok(OverwriteKind::Role),
                    "member" => Ok(OverwriteKind::Member),
                    other => Err(de::Error::custom(format!("unknown overwrite type {other}"))),
                }
            }
        }

        deserializer.deserialize_any(KindVisitor)
    }
}

/// TYPING_START payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TypingStartPayload {
    pub channel_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub timestamp: i64,
}
