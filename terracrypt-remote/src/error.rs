//! Remote gateway error types.

use thiserror::Error;

/// Result type for remote operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur talking to the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout or a 5xx. Safe for the caller to retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// Missing, expired or rejected bearer token. Never retried here.
    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}
