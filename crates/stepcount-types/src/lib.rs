//! Platform-agnostic types for the stepcount workspace.
//!
//! This crate provides the calendar and step types shared by the SQLite
//! store (stepcount-store), the reconciliation core (stepcount-core) and the
//! background service.
//!
//! # Features
//!
//! - `yyyy-MM-dd` calendar days that order like their rendered form
//! - Month keys for `yyyy-MM` prefix aggregation
//! - Inclusive date ranges that iterate every calendar day
//! - Error types for date parsing
//!
//! # Example
//!
//! ```
//! use stepcount_types::{DateRange, StepDate};
//!
//! let start = StepDate::parse("2024-01-01")?;
//! let end = StepDate::parse("2024-01-03")?;
//! let range = DateRange::new(start, end)?;
//! assert_eq!(range.days().count(), 3);
//! # Ok::<(), stepcount_types::ParseError>(())
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{DailySteps, DateRange, Days, MonthKey, StepDate};
