//! Local data persistence for daily step totals.
//!
//! This crate provides SQLite-based storage for the per-day step ledger:
//! one row per calendar date holding the reconciled step count and the raw
//! sensor snapshot it was reconciled against.
//!
//! # Features
//!
//! - Date-keyed records (`yyyy-MM-dd` primary key)
//! - Atomic single-statement writes
//! - Range and month aggregates
//! - Recent/ranged listing with a fluent query builder
//!
//! # Example
//!
//! ```no_run
//! use stepcount_store::{Store, StoredDay};
//! use stepcount_types::StepDate;
//!
//! let store = Store::open_default()?;
//! let today = StepDate::parse("2024-01-02")?;
//!
//! store.upsert(&StoredDay::new(today, 40, 5040))?;
//! let total = store.sum_between(today, today)?.unwrap_or(0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{StoredDay, now_millis};
pub use queries::DayQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/stepcount/steps.db`
/// - macOS: `~/Library/Application Support/stepcount/steps.db`
/// - Windows: `C:\Users\<user>\AppData\Local\stepcount\steps.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("stepcount")
        .join("steps.db")
}
