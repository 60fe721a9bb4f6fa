//! Error types for parsing calendar values in stepcount-types.

use thiserror::Error;

/// Errors that can occur when parsing dates, months and ranges.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The string is not a `yyyy-MM-dd` calendar date.
    #[error("Invalid date '{0}': expected yyyy-MM-dd")]
    InvalidDate(String),

    /// Year/month pair outside the supported calendar.
    #[error("Invalid month {year:04}-{month:02}")]
    InvalidMonth {
        /// Requested year.
        year: i32,
        /// Requested month (1-12).
        month: u8,
    },

    /// Range whose start comes after its end.
    #[error("Invalid range: {start} is after {end}")]
    InvalidRange {
        /// Range start as rendered.
        start: String,
        /// Range end as rendered.
        end: String,
    },
}

/// Result type alias using stepcount-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
