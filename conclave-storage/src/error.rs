//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be read as the requested type.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}
