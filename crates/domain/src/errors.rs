//! Error types used throughout the subsystem

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Courier
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CourierError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, CourierError>;
