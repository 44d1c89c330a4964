//! Permission bitflags and channel permission overwrites
//!
//! Permission values are fixed by the remote protocol and serialized as
//! decimal strings.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::Snowflake;

bitflags! {
    /// Platform permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS          = 1 << 1;
        const BAN_MEMBERS           = 1 << 2;
        /// Bypass all permission checks and overwrites
        const ADMINISTRATOR         = 1 << 3;
        const MANAGE_CHANNELS       = 1 << 4;
        const MANAGE_GUILD          = 1 << 5;
        const ADD_REACTIONS         = 1 << 6;
        const VIEW_AUDIT_LOG        = 1 << 7;
        const PRIORITY_SPEAKER      = 1 << 8;
        const STREAM                = 1 << 9;
        const VIEW_CHANNEL          = 1 << 10;
        const SEND_MESSAGES         = 1 << 11;
        const SEND_TTS_MESSAGES     = 1 << 12;
        const MANAGE_MESSAGES       = 1 << 13;
        const EMBED_LINKS           = 1 << 14;
        const ATTACH_FILES          = 1 << 15;
        const READ_MESSAGE_HISTORY  = 1 << 16;
        const MENTION_EVERYONE      = 1 << 17;
        const USE_EXTERNAL_EMOJIS   = 1 << 18;
        const CONNECT               = 1 << 20;
        const SPEAK                 = 1 << 21;
        const MUTE_MEMBERS          = 1 << 22;
        const DEAFEN_MEMBERS        = 1 << 23;
        const MOVE_MEMBERS          = 1 << 24;
        const USE_VAD               = 1 << 25;
        const CHANGE_NICKNAME       = 1 << 26;
        const MANAGE_NICKNAMES      = 1 << 27;
        const MANAGE_ROLES          = 1 << 28;
        const MANAGE_WEBHOOKS       = 1 << 29;
        const MANAGE_EMOJIS         = 1 << 30;

        /// Everything (server owners, administrators)
        const ALL = u64::MAX;
    }
}

impl Permissions {
    /// Check if the permission set contains a required permission
    ///
    /// Administrators bypass all permission checks.
    #[inline]
    pub fn has(&self, permission: Permissions) -> bool {
        if self.contains(Permissions::ADMINISTRATOR) {
            return true;
        }
        self.contains(permission)
    }

    /// Check if the permission set has any of the given permissions
    #[inline]
    pub fn has_any(&self, permissions: Permissions) -> bool {
        if self.contains(Permissions::ADMINISTRATOR) {
            return true;
        }
        self.intersects(permissions)
    }

    /// Combine permissions from multiple roles
    pub fn combine<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Permissions>,
    {
        roles.into_iter().fold(Permissions::empty(), |acc, p| acc | p)
    }

    /// Parse from string representation (decimal number)
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.parse::<u64>().map(Permissions::from_bits_truncate)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::empty()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.bits().to_string())
    }
}

// Deserialize from string or number
impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct PermissionsVisitor;

        impl Visitor<'_> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing permission bits")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Ok(Permissions::from_bits_truncate(value as u64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Ok(Permissions::from_bits_truncate(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Permissions::parse(value).map_err(|_| de::Error::custom("invalid permissions string"))
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

impl From<u64> for Permissions {
    fn from(bits: u64) -> Self {
        Permissions::from_bits_truncate(bits)
    }
}

/// Tri-state view of one permission inside an overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PermissionState {
    /// Neither allowed nor denied; inherits
    #[default]
    Unset,
    Allowed,
    Denied,
}

/// Who a permission overwrite applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverwriteSubject {
    Role(Snowflake),
    User(Snowflake),
}

impl OverwriteSubject {
    pub fn id(&self) -> Snowflake {
        match self {
            Self::Role(id) | Self::User(id) => *id,
        }
    }
}

/// Per-channel allow/deny masks for a role or a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionOverwrite {
    pub subject: OverwriteSubject,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn new(subject: OverwriteSubject, allow: Permissions, deny: Permissions) -> Self {
        Self {
            subject,
            allow,
            deny,
        }
    }

    /// State of a single permission in this overwrite
    ///
    /// Deny wins if a malformed overwrite sets both bits.
    pub fn state(&self, permission: Permissions) -> PermissionState {
        if self.deny.contains(permission) {
            PermissionState::Denied
        } else if self.allow.contains(permission) {
            PermissionState::Allowed
        } else {
            PermissionState::Unset
        }
    }

    /// Apply this overwrite on top of a permission set
    #[inline]
    pub fn apply(&self, base: Permissions) -> Permissions {
        (base - self.deny) | self.allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_administrator_bypass() {
        let admin = Permissions::ADMINISTRATOR;
        assert!(admin.has(Permissions::VIEW_CHANNEL));
        assert!(admin.has(Permissions::MANAGE_GUILD));
        assert!(admin.has_any(Permissions::BAN_MEMBERS));
    }

    #[test]
    fn test_has_permission() {
        let perms = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        assert!(perms.has(Permissions::VIEW_CHANNEL));
        assert!(!perms.has(Permissions::MANAGE_GUILD));
        assert!(perms.has_any(Permissions::SEND_MESSAGES | Permissions::KICK_MEMBERS));
        assert!(!perms.has_any(Permissions::KICK_MEMBERS));
    }

    #[test]
    fn test_combine_permissions() {
        let combined = Permissions::combine([
            Permissions::VIEW_CHANNEL,
            Permissions::SEND_MESSAGES,
            Permissions::MANAGE_GUILD,
        ]);
        assert_eq!(combined.bits(), (1 << 10) | (1 << 11) | (1 << 5));
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Permissions::ADMINISTRATOR.bits(), 8);
        assert_eq!(Permissions::VIEW_CHANNEL.bits(), 1024);
        assert_eq!(Permissions::SEND_MESSAGES.bits(), 2048);
        assert_eq!(Permissions::MANAGE_ROLES.bits(), 268_435_456);
    }

    #[test]
    fn test_serde() {
        let perms = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        assert_eq!(serde_json::to_string(&perms).unwrap(), "\"3072\"");

        let parsed: Permissions = serde_json::from_str("\"3072\"").unwrap();
        assert_eq!(parsed, perms);
        let parsed: Permissions = serde_json::from_str("3072").unwrap();
        assert_eq!(parsed, perms);
    }

    #[test]
    fn test_overwrite_state() {
        let overwrite = PermissionOverwrite::new(
            OverwriteSubject::Role(Snowflake::new(1)),
            Permissions::SEND_MESSAGES,
            Permissions::ADD_REACTIONS,
        );
        assert_eq!(overwrite.state(Permissions::SEND_MESSAGES), PermissionState::Allowed);
        assert_eq!(overwrite.state(Permissions::ADD_REACTIONS), PermissionState::Denied);
        assert_eq!(overwrite.state(Permissions::VIEW_CHANNEL), PermissionState::Unset);
    }

    #[test]
    fn test_overwrite_apply() {
        let base = Permissions::VIEW_CHANNEL | Permissions::ADD_REACTIONS;
        let overwrite = PermissionOverwrite::new(
            OverwriteSubject::User(Snowflake::new(7)),
            Permissions::SEND_MESSAGES,
            Permissions::ADD_REACTIONS,
        );
        assert_eq!(
            overwrite.apply(base),
            Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES
        );
        assert_eq!(overwrite.subject.id(), Snowflake::new(7));
    }
}
