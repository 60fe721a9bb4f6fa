//! Error types for stepcount-store.

use std::path::PathBuf;

/// Result type for stepcount-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stepcount-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored date could not be parsed.
    #[error("Invalid stored date: {0}")]
    InvalidDate(#[from] stepcount_types::ParseError),

    /// A stored row holds values that cannot be a step record.
    #[error("Corrupt record for {date}: {reason}")]
    CorruptRecord { date: String, reason: String },

    /// A value does not fit the 64-bit signed column type.
    #[error("Value out of range for storage: {0}")]
    ValueOutOfRange(u64),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
