//! Error types for suspension persistence operations.

use thiserror::Error;

/// Result type for checkpoint/backend operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while storing, fetching, or consuming a
/// suspension record.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No record exists under the given key.
    #[error("suspension record not found: {0}")]
    NotFound(String),

    /// The record was already consumed by a prior `resume`.
    #[error("suspension record already consumed: {0}")]
    AlreadyConsumed(String),

    /// The record's `expiresAt` has passed.
    #[error("suspension record expired: {0}")]
    Expired(String),

    /// JSON (de)serialization of the frozen state or payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend's storage medium failed (I/O, connection, etc.).
    #[error("storage error: {0}")]
    Storage(String),

    /// The record's bytes could not be interpreted as a valid record.
    #[error("invalid suspension record: {0}")]
    Invalid(String),

    /// Application-defined error not covered by other variants.
    #[error("{0}")]
    Custom(String),
}
