//! Sync engine error types.

use terracrypt_remote::GatewayError;
use terracrypt_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the coordinator, reconcilers and cold-start tracker.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote error: {0}")]
    Remote(#[from] GatewayError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("authentication required")]
    AuthRequired,

    /// A record expected after a mutation is missing locally.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed notification: {0}")]
    MalformedNotification(String),

    #[error("a cold-start sequence is already running")]
    AlreadyRunning,

    #[error("step {step} failed: {message}")]
    Step { step: String, message: String },

    #[error("sync task aborted: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sync runner not running")]
    ChannelClosed,
}

impl SyncError {
    /// Transport-class failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_retryable())
    }

    /// Missing or rejected credentials. Never retried by this crate.
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::AuthRequired => true,
            SyncError::Remote(e) => e.is_auth(),
            _ => false,
        }
    }
}
