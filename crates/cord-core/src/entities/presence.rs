//! Presence - online status and activity of a user

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::payloads::ActivityPayload;

/// User online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Online and active
    Online,
    /// Away from keyboard
    Idle,
    /// Do not disturb
    #[serde(rename = "dnd")]
    DoNotDisturb,
    /// Only valid when setting the own status; others see `Offline`
    Invisible,
    #[default]
    Offline,
}

impl UserStatus {
    /// Check if this status should be visible to others
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Offline | Self::Invisible)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::DoNotDisturb => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::DoNotDisturb),
            "invisible" => Ok(Self::Invisible),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// What kind of activity a user is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivityType {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
    /// A type this library does not know yet
    Unknown(u8),
}

impl ActivityType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Playing => 0,
            Self::Streaming => 1,
            Self::Listening => 2,
            Self::Watching => 3,
            Self::Custom => 4,
            Self::Competing => 5,
            Self::Unknown(value) => value,
        }
    }
}

impl From<u8> for ActivityType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Playing,
            1 => Self::Streaming,
            2 => Self::Listening,
            3 => Self::Watching,
            4 => Self::Custom,
            5 => Self::Competing,
            other => Self::Unknown(other),
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(ActivityType::from)
    }
}

/// Activity shown next to a user's name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Activity {
    pub kind: ActivityType,
    pub name: String,
    /// Stream url, only for `Streaming`
    pub url: Option<String>,
}

impl Activity {
    pub fn new(kind: ActivityType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            url: None,
        }
    }

    pub fn streaming(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ActivityType::Streaming,
            name: name.into(),
            url: Some(url.into()),
        }
    }
}

impl From<&ActivityPayload> for Activity {
    fn from(payload: &ActivityPayload) -> Self {
        Self {
            kind: payload.kind,
            name: payload.name.clone(),
            url: payload.url.clone(),
        }
    }
}

impl From<&Activity> for ActivityPayload {
    fn from(activity: &Activity) -> Self {
        Self {
            name: activity.name.clone(),
            kind: activity.kind,
            url: activity.url.clone(),
        }
    }
}

/// Status and activity of a user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presence {
    pub status: UserStatus,
    pub activity: Option<Activity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&UserStatus::DoNotDisturb).unwrap(),
            "\"dnd\""
        );
        let status: UserStatus = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(status, UserStatus::Idle);
        assert_eq!("DND".parse::<UserStatus>().unwrap(), UserStatus::DoNotDisturb);
        assert!("away".parse::<UserStatus>().is_err());
    }

    #[test]
    fn test_status_visibility() {
        assert!(UserStatus::Online.is_visible());
        assert!(!UserStatus::Invisible.is_visible());
        assert_eq!(UserStatus::default(), UserStatus::Offline);
    }

    #[test]
    fn test_activity_type_unknown_roundtrip() {
        let kind: ActivityType = serde_json::from_str("9").unwrap();
        assert_eq!(kind, ActivityType::Unknown(9));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "9");
    }
}
