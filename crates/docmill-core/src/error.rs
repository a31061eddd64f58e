//! Error types for docmill.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using docmill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for docmill operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job not found (never created, or already expired and cleaned up)
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Job state machine violation or queue fault
    #[error("Job error: {0}")]
    Job(String),

    /// No extractor capability registered for the file
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Extraction capability reported a failure
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
