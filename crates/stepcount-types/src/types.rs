//! Calendar and step types shared by the store, the tracker and the service.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Month};

use crate::error::{ParseError, ParseResult};

/// A calendar day, rendered and persisted as `yyyy-MM-dd`.
///
/// Ordering follows the calendar, which also matches the lexical ordering of
/// the rendered string. The store relies on that for `BETWEEN` and prefix
/// queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepDate(Date);

impl StepDate {
    /// Build a date from its calendar components.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepcount_types::StepDate;
    ///
    /// let date = StepDate::from_ymd(2024, 1, 31).unwrap();
    /// assert_eq!(date.to_string(), "2024-01-31");
    /// assert!(StepDate::from_ymd(2024, 2, 30).is_err());
    /// ```
    pub fn from_ymd(year: i32, month: u8, day: u8) -> ParseResult<Self> {
        let invalid = || ParseError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day));
        if !(0..=9999).contains(&year) {
            return Err(invalid());
        }
        let month = Month::try_from(month).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| invalid())
    }

    /// Parse a strict `yyyy-MM-dd` string.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepcount_types::StepDate;
    ///
    /// assert!(StepDate::parse("2024-03-09").is_ok());
    /// assert!(StepDate::parse("2024-3-9").is_err());
    /// assert!(StepDate::parse("2024/03/09").is_err());
    /// ```
    pub fn parse(s: &str) -> ParseResult<Self> {
        let invalid = || ParseError::InvalidDate(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(invalid());
        }
        let digits_ok = bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !digits_ok {
            return Err(invalid());
        }

        let year: i32 = s[0..4].parse().map_err(|_| invalid())?;
        let month: u8 = s[5..7].parse().map_err(|_| invalid())?;
        let day: u8 = s[8..10].parse().map_err(|_| invalid())?;
        Self::from_ymd(year, month, day).map_err(|_| invalid())
    }

    /// Wrap an existing `time::Date`.
    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    /// The underlying `time::Date`.
    pub fn date(&self) -> Date {
        self.0
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Calendar month, 1-12.
    pub fn month_number(&self) -> u8 {
        self.0.month() as u8
    }

    /// Day of month, 1-31.
    pub fn day(&self) -> u8 {
        self.0.day()
    }

    /// The month this date belongs to.
    pub fn month(&self) -> MonthKey {
        MonthKey {
            year: self.year(),
            month: self.month_number(),
        }
    }

    /// The following calendar day.
    pub fn next(&self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// The preceding calendar day.
    pub fn previous(&self) -> Option<Self> {
        self.0.previous_day().map(Self)
    }
}

impl fmt::Display for StepDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.year(),
            self.month_number(),
            self.day()
        )
    }
}

impl FromStr for StepDate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Date> for StepDate {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

#[cfg(feature = "serde")]
impl Serialize for StepDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for StepDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A calendar month, rendered as the `yyyy-MM` prefix of its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawMonthKey"))]
pub struct MonthKey {
    year: i32,
    month: u8,
}

impl MonthKey {
    /// Create a month key, validating the month number.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepcount_types::MonthKey;
    ///
    /// assert_eq!(MonthKey::new(2024, 2).unwrap().prefix(), "2024-02");
    /// assert!(MonthKey::new(2024, 13).is_err());
    /// ```
    pub fn new(year: i32, month: u8) -> ParseResult<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(ParseError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1-12.
    pub fn month(&self) -> u8 {
        self.month
    }

    /// The `yyyy-MM` prefix shared by every date in this month.
    pub fn prefix(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawMonthKey {
    year: i32,
    month: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RawMonthKey> for MonthKey {
    type Error = ParseError;

    fn try_from(raw: RawMonthKey) -> ParseResult<Self> {
        Self::new(raw.year, raw.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

/// Steps recorded for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DailySteps {
    /// The calendar day.
    pub date: StepDate,
    /// Reconciled steps for that day.
    pub steps: u64,
}

impl DailySteps {
    /// Create an entry.
    pub fn new(date: StepDate, steps: u64) -> Self {
        Self { date, steps }
    }
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDateRange"))]
pub struct DateRange {
    start: StepDate,
    end: StepDate,
}

impl DateRange {
    /// Create a range; `start` must not come after `end`.
    pub fn new(start: StepDate, end: StepDate) -> ParseResult<Self> {
        if start > end {
            return Err(ParseError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// First day (inclusive).
    pub fn start(&self) -> StepDate {
        self.start
    }

    /// Last day (inclusive).
    pub fn end(&self) -> StepDate {
        self.end
    }

    /// Number of calendar days in the range.
    pub fn len(&self) -> usize {
        (self.end.date() - self.start.date()).whole_days() as usize + 1
    }

    /// A range always holds at least one day.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over every day in ascending order.
    pub fn days(&self) -> Days {
        Days {
            next: Some(self.start),
            end: self.end,
        }
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawDateRange {
    start: StepDate,
    end: StepDate,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDateRange> for DateRange {
    type Error = ParseError;

    fn try_from(raw: RawDateRange) -> ParseResult<Self> {
        Self::new(raw.start, raw.end)
    }
}

/// Iterator over the days of a [`DateRange`].
#[derive(Debug, Clone)]
pub struct Days {
    next: Option<StepDate>,
    end: StepDate,
}

impl Iterator for Days {
    type Item = StepDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current < self.end {
            current.next()
        } else {
            None
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> StepDate {
        StepDate::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        let d = date("2024-01-05");
        assert_eq!(d.year(), 2024);
        assert_eq!(d.month_number(), 1);
        assert_eq!(d.day(), 5);
        assert_eq!(d.to_string(), "2024-01-05");
    }

    #[test]
    fn test_parse_rejects_malformed_dates() {
        for bad in ["", "2024-1-05", "2024-01-5", "20240105", "2024-13-01", "2023-02-29", "abcd-ef-gh", "2024-01-05T00"] {
            assert!(StepDate::parse(bad).is_err(), "{bad} should be rejected");
        }
        assert!(StepDate::parse("2024-02-29").is_ok());
    }

    #[test]
    fn test_ordering_matches_lexical_order() {
        let a = date("2023-12-31");
        let b = date("2024-01-01");
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn test_next_crosses_month_and_year() {
        assert_eq!(date("2024-01-31").next(), Some(date("2024-02-01")));
        assert_eq!(date("2023-12-31").next(), Some(date("2024-01-01")));
        assert_eq!(date("2024-03-01").previous(), Some(date("2024-02-29")));
    }

    #[test]
    fn test_month_key_validation() {
        let feb = MonthKey::new(2024, 2).unwrap();
        assert_eq!((feb.year(), feb.month()), (2024, 2));
        assert_eq!(date("2024-07-14").month().prefix(), "2024-07");
        assert!(MonthKey::new(2024, 0).is_err());
        assert!(MonthKey::new(2024, 13).is_err());
    }

    #[test]
    fn test_range_days_inclusive() {
        let range = DateRange::new(date("2024-01-30"), date("2024-02-02")).unwrap();
        let days: Vec<String> = range.days().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2024-01-30", "2024-01-31", "2024-02-01", "2024-02-02"]);
        assert_eq!(range.len(), 4);
        assert_eq!((range.start(), range.end()), (date("2024-01-30"), date("2024-02-02")));
    }

    #[test]
    fn test_range_rejects_reversed_bounds() {
        let err = DateRange::new(date("2024-01-03"), date("2024-01-01")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidRange { .. }));
        let single = DateRange::new(date("2024-01-03"), date("2024-01-03")).unwrap();
        assert_eq!(single.days().count(), 1);
        assert_eq!(single.len(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_step_date_serializes_as_string() {
        let entry = DailySteps::new(date("2024-01-02"), 40);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"date":"2024-01-02","steps":40}"#);
        let back: DailySteps = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
        assert!(serde_json::from_str::<StepDate>(r#""2024-02-30""#).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_enforces_invariants() {
        let month: MonthKey = serde_json::from_str(r#"{"year":2024,"month":2}"#).unwrap();
        assert_eq!(month.prefix(), "2024-02");
        assert!(serde_json::from_str::<MonthKey>(r#"{"year":2024,"month":13}"#).is_err());
        assert!(serde_json::from_str::<MonthKey>(r#"{"year":2024,"month":0}"#).is_err());

        let range: DateRange =
            serde_json::from_str(r#"{"start":"2024-01-01","end":"2024-01-03"}"#).unwrap();
        assert_eq!(range.len(), 3);
        assert!(
            serde_json::from_str::<DateRange>(r#"{"start":"2024-01-03","end":"2024-01-01"}"#)
                .is_err()
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Parsing arbitrary strings never panics.
        #[test]
        fn parse_never_panics(s in ".{0,16}") {
            let _ = StepDate::parse(&s);
        }

        /// Rendering then parsing a valid date yields the same date.
        #[test]
        fn display_parse_identity(year in 1900i32..2100, month in 1u8..=12, day in 1u8..=28) {
            let d = StepDate::from_ymd(year, month, day).unwrap();
            prop_assert_eq!(StepDate::parse(&d.to_string()).unwrap(), d);
        }
    }
}
