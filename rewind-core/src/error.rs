/*!
Error types for the rewind core engine.
*/

use rewind_retry::Transient;
use thiserror::Error;

/// Result type used throughout the rewind core.
pub type Result<T> = std::result::Result<T, RewindError>;

/// Errors that can occur during backup and recovery operations.
#[derive(Error, Debug)]
pub enum RewindError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Artifact store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Malformed or unusable snapshot document
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl RewindError {
    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new invalid-snapshot error
    pub fn invalid_snapshot<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
}

impl Transient for RewindError {
    fn is_transient(&self) -> bool {
        match self {
            // Retry on network/timeout issues
            RewindError::Store(msg) => {
                msg.contains("timed out")
                    || msg.contains("dispatch")
                    || msg.contains("connection")
                    || msg.contains("InternalError")
                    || msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("500")
            }
            RewindError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}
