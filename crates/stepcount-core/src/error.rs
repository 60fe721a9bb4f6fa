//! Error types for stepcount-core.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::PermissionDenied`] | Ask the user, then call `start` again | Capability gate was closed; nothing was touched |
//! | [`Error::SensorUnavailable`] | Do not retry | No step-counter hardware on this device |
//! | [`Error::Persistence`] | Retry on the next reading or manual action | Tracker state was not advanced |
//! | [`Error::Store`] | Retry on the next reading or manual action | SQLite busy or I/O hiccup |
//! | [`Error::InvalidDate`] | Do not retry | Caller supplied a malformed date |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! There is no background retry scheduler. A failed reconciliation or flush
//! leaves the tracker exactly where it was, so the next natural event
//! recomputes from the same starting point.

use thiserror::Error;

/// Errors that can occur while tracking and persisting steps.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Sensor access is not permitted by the caller-supplied capability gate.
    #[error("Sensor access not permitted")]
    PermissionDenied,

    /// The device has no step-counter sensor.
    #[error("Step counter sensor unavailable: {sensor}")]
    SensorUnavailable {
        /// Name of the sensor that was requested.
        sensor: String,
    },

    /// A persistence backend operation failed.
    #[error("Persistence error during '{operation}': {message}")]
    Persistence {
        /// The contract operation that failed.
        operation: String,
        /// Backend-provided description.
        message: String,
    },

    /// SQLite store error.
    #[error("Store error: {0}")]
    Store(#[from] stepcount_store::Error),

    /// A date, month or range argument was malformed.
    #[error("Invalid date: {0}")]
    InvalidDate(#[from] stepcount_types::ParseError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a persistence error with operation context.
    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a sensor unavailable error.
    pub fn sensor_unavailable(sensor: impl Into<String>) -> Self {
        Self::SensorUnavailable {
            sensor: sensor.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether retrying on the next natural event may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Store(_))
    }
}

/// Result type alias using stepcount-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
