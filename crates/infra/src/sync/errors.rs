//! Sync-specific error types
//!
//! Provides error classification for replay operations. The retryable vs
//! permanent split drives the drain loop: retryable failures re-queue the
//! entry with backoff, permanent failures mark it failed and let the drain
//! continue past it.

use courier_domain::CourierError;
use thiserror::Error;

/// Categories of sync errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// Authentication errors (401, 403) - retryable after credential refresh
    Authentication,
    /// Rate limiting errors (429) - retryable with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Network/connection/timeout errors - retryable
    Network,
    /// Validation, conflict and other 4xx rejections - non-retryable
    Client,
    /// Local storage errors - retryable
    Storage,
    /// Cancelled before completion - treated as a definitive rejection
    Cancelled,
}

/// Replay operation errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Validation rejected: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Get the error category for this error
    pub fn category(&self) -> SyncErrorCategory {
        match self {
            Self::Auth(_) => SyncErrorCategory::Authentication,
            Self::RateLimit(_) => SyncErrorCategory::RateLimit,
            Self::Server(_) => SyncErrorCategory::Server,
            Self::Validation(_) | Self::Conflict(_) | Self::Client(_) => {
                SyncErrorCategory::Client
            }
            Self::Network(_) | Self::Timeout(_) => SyncErrorCategory::Network,
            Self::Storage(_) => SyncErrorCategory::Storage,
            Self::Cancelled => SyncErrorCategory::Cancelled,
        }
    }

    /// Check if this error should be retried
    ///
    /// Timeouts are retryable by construction: the outcome is ambiguous and
    /// idempotent replay (keyed by action id) makes a duplicate apply safe.
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            SyncErrorCategory::Authentication
                | SyncErrorCategory::RateLimit
                | SyncErrorCategory::Server
                | SyncErrorCategory::Network
                | SyncErrorCategory::Storage
        )
    }
}

/// Convert from CourierError to SyncError
impl From<CourierError> for SyncError {
    fn from(err: CourierError) -> Self {
        match err {
            CourierError::Storage(message) => Self::Storage(message),
            CourierError::Network(message) => Self::Network(message),
            CourierError::Config(message) => Self::Client(message),
            CourierError::UnknownAction(message) | CourierError::InvalidInput(message) => {
                Self::Client(message)
            }
            CourierError::Internal(message) => Self::Server(message),
        }
    }
}

/// Map an HTTP status code to the matching sync error.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: String) -> SyncError {
    match status.as_u16() {
        401 | 403 => SyncError::Auth(body),
        409 => SyncError::Conflict(body),
        422 => SyncError::Validation(body),
        429 => SyncError::RateLimit(body),
        500..=599 => SyncError::Server(format!("server error {status}: {body}")),
        _ => SyncError::Client(format!("client error {status}: {body}")),
    }
}
