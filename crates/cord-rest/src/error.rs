//! REST error types

use std::time::Duration;

/// Failure of a REST call
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Non-success status other than 403 and 429
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        body: String,
        /// Platform error code from the JSON body, if any
        code: Option<u64>,
        message: String,
    },

    #[error("Missing permissions: {body}")]
    MissingPermissions { body: String },

    /// Still rate limited after the retry
    #[error("Rate limited, retry after {retry_after:?} (global: {global})")]
    RateLimited { retry_after: Duration, global: bool },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RestError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::MissingPermissions { .. } => Some(403),
            Self::RateLimited { .. } => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::InvalidUrl(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Build the error for a non-success response body
    pub(crate) fn from_response(status: u16, body: String) -> Self {
        if status == 403 {
            return Self::MissingPermissions { body };
        }

        #[derive(serde::Deserialize)]
        struct ErrorBody {
            code: Option<u64>,
            message: Option<String>,
        }

        let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
        let code = parsed.as_ref().and_then(|b| b.code);
        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("status {status}"));
        Self::Status {
            status,
            body,
            code,
            message,
        }
    }
}

pub type RestResult<T> = Result<T, RestError>;
