//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use stepcount_types::{MonthKey, StepDate};

use crate::error::{Error, Result};
use crate::models::StoredDay;
use crate::queries::DayQuery;
use crate::schema;

/// SQLite-based store for daily step records.
///
/// Every write is a single SQL statement, so each record update is atomic
/// from the point of view of other connections.
pub struct Store {
    conn: Connection,
}

/// Raw column values of a `daily_steps` row before validation.
type RawDay = (String, i64, i64, i64);

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // WAL lets the service and a CLI query share the file.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

fn to_column(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::ValueOutOfRange(value))
}

fn from_column(date: &str, field: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::CorruptRecord {
        date: date.to_string(),
        reason: format!("negative {} ({})", field, value),
    })
}

fn parse_row(raw: RawDay) -> Result<StoredDay> {
    let (date, accumulated, snapshot, timestamp) = raw;
    Ok(StoredDay {
        accumulated_steps: from_column(&date, "accumulated_steps", accumulated)?,
        sensor_snapshot: from_column(&date, "sensor_snapshot", snapshot)?,
        date: StepDate::parse(&date)?,
        timestamp,
    })
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDay> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn sum_to_steps(label: &str, sum: Option<i64>) -> Result<Option<u64>> {
    sum.map(|v| from_column(label, "sum", v)).transpose()
}

// Single-record operations
impl Store {
    /// Get the record for a date.
    pub fn get_by_date(&self, date: StepDate) -> Result<Option<StoredDay>> {
        let raw = self
            .conn
            .query_row(
                "SELECT date, accumulated_steps, sensor_snapshot, timestamp
                 FROM daily_steps WHERE date = ?",
                [date.to_string()],
                read_raw,
            )
            .optional()?;

        raw.map(parse_row).transpose()
    }

    /// Insert a record or replace every field of an existing one.
    ///
    /// The stored timestamp never moves backwards.
    pub fn upsert(&self, day: &StoredDay) -> Result<()> {
        self.conn.execute(
            "INSERT INTO daily_steps (date, accumulated_steps, sensor_snapshot, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO UPDATE SET
                accumulated_steps = ?2,
                sensor_snapshot = ?3,
                timestamp = MAX(timestamp, ?4)",
            rusqlite::params![
                day.date.to_string(),
                to_column(day.accumulated_steps)?,
                to_column(day.sensor_snapshot)?,
                day.timestamp,
            ],
        )?;

        debug!(
            "Upserted {}: steps={}, snapshot={}",
            day.date, day.accumulated_steps, day.sensor_snapshot
        );
        Ok(())
    }

    /// Update the step fields of an existing record.
    ///
    /// Returns `false` when no record exists for the date.
    pub fn update_fields(
        &self,
        date: StepDate,
        accumulated_steps: u64,
        sensor_snapshot: u64,
        timestamp: i64,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE daily_steps SET
                accumulated_steps = ?2,
                sensor_snapshot = ?3,
                timestamp = MAX(timestamp, ?4)
             WHERE date = ?1",
            rusqlite::params![
                date.to_string(),
                to_column(accumulated_steps)?,
                to_column(sensor_snapshot)?,
                timestamp,
            ],
        )?;

        debug!(
            "Updated {}: steps={}, snapshot={} ({} row)",
            date, accumulated_steps, sensor_snapshot, changed
        );
        Ok(changed > 0)
    }

    /// Delete the record for a date. Returns whether a row was removed.
    pub fn delete_by_date(&self, date: StepDate) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM daily_steps WHERE date = ?", [date.to_string()])?;
        info!("Deleted step record for {} ({} row)", date, removed);
        Ok(removed > 0)
    }

    /// Delete every record. Returns the number of rows removed.
    pub fn delete_all(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM daily_steps", [])?;
        info!("Deleted all step records ({} rows)", removed);
        Ok(removed)
    }
}

// Aggregate and listing operations
impl Store {
    /// Sum of accumulated steps for dates in `start..=end`.
    ///
    /// Returns `None` when no record falls in the range.
    pub fn sum_between(&self, start: StepDate, end: StepDate) -> Result<Option<u64>> {
        let sum: Option<i64> = self.conn.query_row(
            "SELECT SUM(accumulated_steps) FROM daily_steps WHERE date BETWEEN ?1 AND ?2",
            [start.to_string(), end.to_string()],
            |row| row.get(0),
        )?;
        sum_to_steps(&format!("{}..{}", start, end), sum)
    }

    /// Sum of accumulated steps for every date of a calendar month.
    ///
    /// Returns `None` when the month has no records.
    pub fn sum_by_month_prefix(&self, month: MonthKey) -> Result<Option<u64>> {
        let prefix = month.prefix();
        let sum: Option<i64> = self.conn.query_row(
            "SELECT SUM(accumulated_steps) FROM daily_steps WHERE date LIKE ?1 || '-%'",
            [&prefix],
            |row| row.get(0),
        )?;
        sum_to_steps(&prefix, sum)
    }

    /// Query stored days with filters.
    pub fn query_days(&self, query: &DayQuery) -> Result<Vec<StoredDay>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), read_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(parse_row).collect()
    }

    /// Records with dates in `start..=end`, oldest first.
    pub fn list_between(&self, start: StepDate, end: StepDate) -> Result<Vec<StoredDay>> {
        self.query_days(&DayQuery::new().since(start).until(end).oldest_first())
    }

    /// The `limit` most recent records, newest first.
    pub fn list_recent(&self, limit: u32) -> Result<Vec<StoredDay>> {
        self.query_days(&DayQuery::new().limit(limit))
    }

    /// Every record, newest first.
    pub fn list_all(&self) -> Result<Vec<StoredDay>> {
        self.query_days(&DayQuery::new())
    }

    /// Number of stored days.
    pub fn count_days(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM daily_steps", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> StepDate {
        StepDate::parse(s).unwrap()
    }

    fn day(s: &str, steps: u64, snapshot: u64) -> StoredDay {
        StoredDay::new(date(s), steps, snapshot).with_timestamp(1_000)
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_days().unwrap(), 0);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("steps.db");

        {
            let store = Store::open(&path).unwrap();
            store.upsert(&day("2024-01-01", 10, 100)).unwrap();
        }

        let reopened = Store::open(&path).unwrap();
        let stored = reopened.get_by_date(date("2024-01-01")).unwrap().unwrap();
        assert_eq!(stored.accumulated_steps, 10);
    }

    #[test]
    fn test_upsert_and_get() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_by_date(date("2024-01-01")).unwrap().is_none());

        store.upsert(&day("2024-01-01", 10, 500)).unwrap();
        store.upsert(&day("2024-01-01", 25, 515)).unwrap();

        let stored = store.get_by_date(date("2024-01-01")).unwrap().unwrap();
        assert_eq!(stored.accumulated_steps, 25);
        assert_eq!(stored.sensor_snapshot, 515);
        assert_eq!(store.count_days().unwrap(), 1);
    }

    #[test]
    fn test_update_fields_requires_existing_row() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.update_fields(date("2024-01-01"), 5, 5, 1).unwrap());

        store.upsert(&day("2024-01-01", 0, 500)).unwrap();
        assert!(store.update_fields(date("2024-01-01"), 40, 540, 2_000).unwrap());

        let stored = store.get_by_date(date("2024-01-01")).unwrap().unwrap();
        assert_eq!(stored.accumulated_steps, 40);
        assert_eq!(stored.sensor_snapshot, 540);
        assert_eq!(stored.timestamp, 2_000);
    }

    #[test]
    fn test_timestamp_never_moves_backwards() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert(&day("2024-01-01", 10, 100).with_timestamp(5_000))
            .unwrap();
        store.update_fields(date("2024-01-01"), 20, 110, 4_000).unwrap();

        let stored = store.get_by_date(date("2024-01-01")).unwrap().unwrap();
        assert_eq!(stored.accumulated_steps, 20);
        assert_eq!(stored.timestamp, 5_000);
    }

    #[test]
    fn test_sum_between_and_month() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(
            store.sum_between(date("2024-01-01"), date("2024-01-31")).unwrap(),
            None
        );

        store.upsert(&day("2024-01-30", 100, 0)).unwrap();
        store.upsert(&day("2024-01-31", 50, 0)).unwrap();
        store.upsert(&day("2024-02-01", 7, 0)).unwrap();

        assert_eq!(
            store.sum_between(date("2024-01-31"), date("2024-02-01")).unwrap(),
            Some(57)
        );
        let january = MonthKey::new(2024, 1).unwrap();
        assert_eq!(store.sum_by_month_prefix(january).unwrap(), Some(150));
        let march = MonthKey::new(2024, 3).unwrap();
        assert_eq!(store.sum_by_month_prefix(march).unwrap(), None);
    }

    #[test]
    fn test_listing_order() {
        let store = Store::open_in_memory().unwrap();
        for (d, steps) in [("2024-01-02", 2), ("2024-01-01", 1), ("2024-01-03", 3)] {
            store.upsert(&day(d, steps, 0)).unwrap();
        }

        let between: Vec<u64> = store
            .list_between(date("2024-01-01"), date("2024-01-02"))
            .unwrap()
            .iter()
            .map(|d| d.accumulated_steps)
            .collect();
        assert_eq!(between, vec![1, 2]);

        let recent: Vec<u64> = store
            .list_recent(2)
            .unwrap()
            .iter()
            .map(|d| d.accumulated_steps)
            .collect();
        assert_eq!(recent, vec![3, 2]);

        assert_eq!(store.list_all().unwrap().len(), 3);
    }

    #[test]
    fn test_delete_operations() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&day("2024-01-01", 1, 0)).unwrap();
        store.upsert(&day("2024-01-02", 2, 0)).unwrap();

        assert!(store.delete_by_date(date("2024-01-01")).unwrap());
        assert!(!store.delete_by_date(date("2024-01-01")).unwrap());
        assert_eq!(store.delete_all().unwrap(), 1);
        assert_eq!(store.count_days().unwrap(), 0);
    }

    #[test]
    fn test_rejects_values_beyond_i64() {
        let store = Store::open_in_memory().unwrap();
        let err = store.upsert(&day("2024-01-01", u64::MAX, 0)).unwrap_err();
        assert!(matches!(err, Error::ValueOutOfRange(_)));
    }

    #[test]
    fn test_negative_column_is_reported_as_corrupt() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO daily_steps VALUES ('2024-01-01', -5, 0, 0)",
                [],
            )
            .unwrap();

        let err = store.get_by_date(date("2024-01-01")).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }
}
