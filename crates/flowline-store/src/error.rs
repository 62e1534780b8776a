//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in the store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization of a JSON column failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
