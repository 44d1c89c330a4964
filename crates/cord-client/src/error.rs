//! Client error types
//!
//! One error type for everything the public façade returns.

use cord_common::ConfigError;
use cord_core::{DomainError, Snowflake};
use cord_gateway::GatewayError;
use cord_rest::RestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: Snowflake },

    #[error("This client does not run shard {0}")]
    UnknownShard(u32),
}

impl ClientError {
    pub fn not_found(resource: &'static str, id: Snowflake) -> Self {
        Self::NotFound { resource, id }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rest(e) => e.is_not_found(),
            Self::Domain(e) => e.is_not_found(),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }

    /// Whether retrying the same call cannot succeed
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::UnknownShard(_) => true,
            Self::Gateway(e) => e.is_fatal(),
            _ => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(ClientError::not_found("Message", Snowflake::new(5)).is_not_found());
        assert!(ClientError::from(DomainError::UnknownServer(Snowflake::new(1))).is_not_found());
        assert!(!ClientError::UnknownShard(3).is_not_found());
        assert_eq!(
            ClientError::not_found("Message", Snowflake::new(5)).to_string(),
            "Message not found: 5"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ClientError::from(GatewayError::AuthenticationFailed).is_fatal());
        assert!(!ClientError::from(GatewayError::Shutdown).is_fatal());
        assert!(ClientError::from(ConfigError::MissingVar("CORD_TOKEN")).is_fatal());
    }
}
