//! Veilgate error types

use thiserror::Error;

/// Veilgate error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or unacceptable input, reported before any side effect
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The staged transaction was already resolved or has expired
    #[error("Pending request not found or expired: {0}")]
    PendingNotFound(String),

    /// Detection/redaction error
    #[error("Scrub error: {0}")]
    Scrub(String),

    /// Ephemeral store error
    #[error("Pending store error: {0}")]
    Store(String),

    /// External capability error (entity classifier, judge, model, trail sink)
    #[error("Upstream capability error: {0}")]
    Upstream(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for veilgate operations
pub type Result<T> = std::result::Result<T, Error>;
