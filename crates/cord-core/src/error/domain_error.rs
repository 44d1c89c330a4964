//! Domain errors - lookup misses and invalid payload data

use thiserror::Error;

use crate::value_objects::{Snowflake, SnowflakeParseError};

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Unknown server: {0}")]
    UnknownServer(Snowflake),

    #[error("Unknown channel: {0}")]
    UnknownChannel(Snowflake),

    #[error("Unknown user: {0}")]
    UnknownUser(Snowflake),

    #[error("Unknown role: {0}")]
    UnknownRole(Snowflake),

    #[error("Unknown message: {0}")]
    UnknownMessage(Snowflake),

    // =========================================================================
    // Payload Errors
    // =========================================================================
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid snowflake: {0}")]
    InvalidSnowflake(#[from] SnowflakeParseError),
}

impl DomainError {
    /// Get an error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownServer(_) => "UNKNOWN_SERVER",
            Self::UnknownChannel(_) => "UNKNOWN_CHANNEL",
            Self::UnknownUser(_) => "UNKNOWN_USER",
            Self::UnknownRole(_) => "UNKNOWN_ROLE",
            Self::UnknownMessage(_) => "UNKNOWN_MESSAGE",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::InvalidSnowflake(_) => "INVALID_SNOWFLAKE",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownServer(_)
                | Self::UnknownChannel(_)
                | Self::UnknownUser(_)
                | Self::UnknownRole(_)
                | Self::UnknownMessage(_)
        )
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
