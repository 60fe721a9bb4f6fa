//! Wall-clock abstraction.
//!
//! Day boundaries decide which record a write lands in, so everything that
//! asks "what is today" goes through a [`Clock`]. Production code uses
//! [`SystemClock`]; tests and simulations use [`FixedClock`].

use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

use stepcount_types::StepDate;

/// Source of the current calendar day and write timestamps.
pub trait Clock: Send + Sync {
    /// The current calendar day in the user's local time.
    fn today(&self) -> StepDate;

    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Clock backed by the operating system.
///
/// Uses the local UTC offset when it can be determined and falls back to UTC
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> StepDate {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        StepDate::from_date(now.date())
    }

    fn now_millis(&self) -> i64 {
        stepcount_store::now_millis()
    }
}

/// A manually driven clock.
///
/// # Example
///
/// ```
/// use stepcount_core::{Clock, FixedClock};
/// use stepcount_types::StepDate;
///
/// let clock = FixedClock::new(StepDate::parse("2024-01-31").unwrap());
/// clock.advance_days(1);
/// assert_eq!(clock.today().to_string(), "2024-02-01");
/// ```
#[derive(Debug)]
pub struct FixedClock {
    date: RwLock<StepDate>,
    millis: AtomicI64,
}

impl FixedClock {
    /// Create a clock frozen at `date`.
    pub fn new(date: StepDate) -> Self {
        Self {
            date: RwLock::new(date),
            millis: AtomicI64::new(1),
        }
    }

    /// Move to another day.
    pub fn set_date(&self, date: StepDate) {
        *self.date.write().unwrap_or_else(|e| e.into_inner()) = date;
    }

    /// Move forward by whole days.
    pub fn advance_days(&self, days: u32) {
        let mut date = self.date.write().unwrap_or_else(|e| e.into_inner());
        for _ in 0..days {
            if let Some(next) = date.next() {
                *date = next;
            }
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> StepDate {
        *self.date.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Strictly increasing so successive writes are distinguishable.
    fn now_millis(&self) -> i64 {
        self.millis.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_moves_only_when_told() {
        let clock = FixedClock::new(StepDate::parse("2023-12-31").unwrap());
        assert_eq!(clock.today().to_string(), "2023-12-31");

        clock.advance_days(2);
        assert_eq!(clock.today().to_string(), "2024-01-02");

        clock.set_date(StepDate::parse("2024-06-01").unwrap());
        assert_eq!(clock.today().to_string(), "2024-06-01");
    }

    #[test]
    fn test_fixed_clock_timestamps_increase() {
        let clock = FixedClock::new(StepDate::parse("2024-01-01").unwrap());
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b > a);
    }

    #[test]
    fn test_system_clock_is_close_to_utc() {
        let clock = SystemClock;
        let utc = OffsetDateTime::now_utc().date();
        let today = clock.today().date();
        // Local offsets are at most 14 hours away from UTC.
        assert!((today - utc).whole_days().abs() <= 1);
        assert!(clock.now_millis() > 0);
    }
}
