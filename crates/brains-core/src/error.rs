//! Error types for the brains core.

use thiserror::Error;

/// Result type alias using the brains Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for brains operations.
///
/// Link-resolution misses are deliberately absent: a `[[target]]` that fails
/// to resolve is modeled as `is_valid = false` data on the link row, because
/// broken links are a normal state for documents under edit.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error). Covers storage-transient
    /// failures (lock timeout, deadlock) that the caller's retry wrapper handles.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Card not found
    #[error("Card not found: {0}")]
    CardNotFound(uuid::Uuid),

    /// Stream not found
    #[error("Stream not found: {0}")]
    StreamNotFound(uuid::Uuid),

    /// Brain not found
    #[error("Brain not found: {0}")]
    BrainNotFound(uuid::Uuid),

    /// Invalid input, including ordering-invariant violations such as a
    /// batch reorder instruction referencing a card outside the stream.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
