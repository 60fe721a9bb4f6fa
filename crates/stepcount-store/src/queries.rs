//! Query builder for stored days.
//!
//! [`DayQuery`] follows the builder pattern: every filter is optional and
//! can be chained in any order.
//!
//! # Example
//!
//! ```
//! use stepcount_store::{DayQuery, Store};
//! use stepcount_types::StepDate;
//!
//! let store = Store::open_in_memory()?;
//!
//! // The last seven recorded days, newest first
//! let recent = store.query_days(&DayQuery::new().limit(7))?;
//!
//! // A date window in chronological order
//! let january = DayQuery::new()
//!     .since(StepDate::parse("2024-01-01")?)
//!     .until(StepDate::parse("2024-01-31")?)
//!     .oldest_first();
//! let days = store.query_days(&january)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use stepcount_types::StepDate;

/// Fluent query builder for [`Store::query_days`](crate::Store::query_days).
///
/// By default results are ordered by date descending (newest first).
#[derive(Debug, Default, Clone)]
pub struct DayQuery {
    /// Include days on or after this date.
    pub since: Option<StepDate>,
    /// Include days on or before this date.
    pub until: Option<StepDate>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by date descending.
    pub newest_first: bool,
}

impl DayQuery {
    /// Create a query over every stored day, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Only days on or after `date`.
    pub fn since(mut self, date: StepDate) -> Self {
        self.since = Some(date);
        self
    }

    /// Only days on or before `date`.
    pub fn until(mut self, date: StepDate) -> Self {
        self.until = Some(date);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order results chronologically.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    ///
    /// Dates are compared as `yyyy-MM-dd` strings, whose lexical order is
    /// calendar order.
    pub(crate) fn build_where(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(since) = self.since {
            conditions.push("date >= ?");
            params.push(since.to_string());
        }

        if let Some(until) = self.until {
            conditions.push("date <= ?");
            params.push(until.to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT date, accumulated_steps, sensor_snapshot, timestamp \
             FROM daily_steps {} ORDER BY date {}",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}
