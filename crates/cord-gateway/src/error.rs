//! Gateway error types

use std::time::Duration;

use cord_core::DomainError;
use cord_rest::RestError;
use thiserror::Error;

/// Session-level errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// WebSocket or TLS failure
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// TCP or proxy failure before the websocket handshake
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Proxy refused the tunnel: {0}")]
    Proxy(String),

    #[error("No Hello received within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Identify answered with a non-resumable InvalidSession
    #[error("Handshake rejected by the gateway")]
    HandshakeRejected,

    #[error("Gateway closed the connection: {reason} ({code})")]
    FatalClose { code: u16, reason: String },

    #[error("Gave up after {0} reconnect attempts")]
    ReconnectsExhausted(u32),

    #[error("Invalid gateway url: {0}")]
    InvalidUrl(String),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Gateway url lookup failed: {0}")]
    Rest(#[from] RestError),

    #[error("Shard shut down")]
    Shutdown,
}

impl GatewayError {
    /// Whether the session stops instead of reconnecting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::HandshakeRejected
                | Self::FatalClose { .. }
                | Self::ReconnectsExhausted(_)
                | Self::InvalidUrl(_)
        )
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a single packet handler; the packet is dropped
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Backfill failed: {0}")]
    Backfill(#[from] RestError),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(GatewayError::AuthenticationFailed.is_fatal());
        assert!(GatewayError::FatalClose {
            code: 4013,
            reason: "Invalid intents".into()
        }
        .is_fatal());
        assert!(GatewayError::ReconnectsExhausted(10).is_fatal());
        assert!(!GatewayError::HandshakeTimeout(Duration::from_secs(30)).is_fatal());
        assert!(!GatewayError::Shutdown.is_fatal());
    }

    #[test]
    fn test_handler_error_from_domain() {
        let error = HandlerError::from(DomainError::UnknownServer(cord_core::Snowflake::new(1)));
        assert_eq!(error.to_string(), "Unknown server: 1");
    }
}
