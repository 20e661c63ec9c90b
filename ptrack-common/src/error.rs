//! Common error types for ptrack

use thiserror::Error;

/// Common result type for ptrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the storage backends and the API service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unique constraint violation (e.g. duplicate username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a NotFound error for a table/id pair
    pub fn not_found(kind: &str, id: i64) -> Self {
        Error::NotFound(format!("{} with id {} not found", kind, id))
    }

    /// True when the error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
