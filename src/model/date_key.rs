//! Calendar date keys.
//!
//! Every per-day record is keyed by a canonical `YYYY-MM-DD` string in the
//! app's fixed time zone. `DateKey` wraps a `chrono::NaiveDate` so day
//! arithmetic (yesterday, ranges, weekdays) happens on the typed side and the
//! string form only appears at storage and wire boundaries.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

const DATE_FMT: &str = "%Y-%m-%d";

/// A single calendar day.
///
/// Ordering follows the calendar, so `DateKey`s sort the same way their
/// `YYYY-MM-DD` strings do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Parse a canonical `YYYY-MM-DD` key.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let date = NaiveDate::parse_from_str(s, DATE_FMT)
            .map_err(|_| EngineError::InvalidDateKey(s.to_string()))?;
        // chrono accepts unpadded fields ("2026-1-5"); keys must round-trip exactly.
        if date.format(DATE_FMT).to_string() != s {
            return Err(EngineError::InvalidDateKey(s.to_string()));
        }
        Ok(Self(date))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// ISO weekday: 1 = Monday … 7 = Sunday.
    pub fn iso_weekday(&self) -> u8 {
        self.0.weekday().number_from_monday() as u8
    }

    /// `YYYY-MM` prefix of the key. Freeze quotas are counted per month.
    pub fn month_prefix(&self) -> String {
        self.0.format("%Y-%m").to_string()
    }

    /// The previous calendar day. Saturates at the chrono epoch floor.
    pub fn pred(&self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// The next calendar day. Saturates at the chrono epoch ceiling.
    pub fn succ(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// Whole days from `earlier` to `self`. Negative if `self` is earlier.
    pub fn days_since(&self, earlier: DateKey) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    /// `self` shifted back `days` calendar days.
    pub fn back(&self, days: u64) -> Self {
        self.0
            .checked_sub_days(chrono::Days::new(days))
            .map(Self)
            .unwrap_or(*self)
    }

    /// Every day from `self` through `end`, inclusive. Empty when `end < self`.
    pub fn range_to(&self, end: DateKey) -> impl Iterator<Item = DateKey> {
        self.0
            .iter_days()
            .take_while(move |d| *d <= end.0)
            .map(DateKey)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FMT))
    }
}

impl FromStr for DateKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DateKey {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DateKey> for String {
    fn from(d: DateKey) -> Self {
        d.to_string()
    }
}

impl From<NaiveDate> for DateKey {
    fn from(d: NaiveDate) -> Self {
        Self(d)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    #[test]
    fn parse_round_trips() {
        let key = d("2025-03-09");
        assert_eq!(key.to_string(), "2025-03-09");
    }

    #[test]
    fn parse_rejects_unpadded_and_garbage() {
        assert!(DateKey::parse("2025-3-9").is_err());
        assert!(DateKey::parse("2025-03-09T00:00:00Z").is_err());
        assert!(DateKey::parse("not-a-date").is_err());
        assert!(DateKey::parse("2025-02-30").is_err());
    }

    #[test]
    fn ordering_matches_string_ordering() {
        assert!(d("2025-01-31") < d("2025-02-01"));
        assert!("2025-01-31" < "2025-02-01");
    }

    #[test]
    fn iso_weekday_monday_is_one() {
        // 2025-03-03 is a Monday, 2025-03-09 a Sunday.
        assert_eq!(d("2025-03-03").iso_weekday(), 1);
        assert_eq!(d("2025-03-09").iso_weekday(), 7);
    }

    #[test]
    fn month_prefix_and_arithmetic() {
        let key = d("2025-03-01");
        assert_eq!(key.month_prefix(), "2025-03");
        assert_eq!(key.pred().to_string(), "2025-02-28");
        assert_eq!(key.succ().to_string(), "2025-03-02");
        assert_eq!(key.days_since(d("2025-02-28")), 1);
        assert_eq!(d("2025-03-10").back(10), d("2025-02-28"));
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let days: Vec<String> = d("2025-02-27")
            .range_to(d("2025-03-02"))
            .map(|k| k.to_string())
            .collect();
        assert_eq!(days, ["2025-02-27", "2025-02-28", "2025-03-01", "2025-03-02"]);
        assert_eq!(d("2025-03-02").range_to(d("2025-03-01")).count(), 0);
    }

    #[test]
    fn serde_uses_canonical_string_form() {
        let key = d("2025-12-31");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2025-12-31\"");
        let back: DateKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<DateKey>("\"2025-13-01\"").is_err());
    }
}
