//! Streak computation.
//!
//! Derives current/best streak state from a day-color history plus the freeze
//! ledger and the user's rest-day configuration. Nothing here is persisted;
//! the result is recomputed from history on every read and cached upstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::freeze::FreezeRecord;
use crate::model::{DateKey, DayColor};

/// Derived streak state as of a reference day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Streak {
    /// Length of the preserving run ending at (or just before) the reference day.
    pub current: u32,
    /// Longest preserving run anywhere in the observed history.
    pub best: u32,
    /// Most recent green day, if any.
    pub last_green: Option<DateKey>,
    /// Calendar days between the reference day and `last_green`.
    pub days_since_last_green: Option<i64>,
}

/// Compute streak state from `history`, ordered or not, as of `today`.
///
/// A day preserves the streak when it is green or a freeze was consumed for
/// it; frozen days count toward the length without being green. Rest weekdays
/// are skipped outright: they neither extend nor break a run. Any other day,
/// including `empty` and days absent from the history, breaks the run.
///
/// `today` itself is still in progress while the user can act on it, so when
/// it is not yet preserving the scan starts at yesterday instead of reporting
/// a broken streak. A day is only counted as a break once it is over.
///
/// The backward scan never walks past the earliest observed date; days we
/// have no data for cannot be claimed as preserved.
pub fn compute(
    history: &[(DateKey, DayColor)],
    freezes: &FreezeRecord,
    rest_days: &[u8],
    today: DateKey,
) -> Streak {
    if history.is_empty() {
        return Streak::default();
    }

    let colors: BTreeMap<DateKey, DayColor> = history.iter().copied().collect();
    // Non-empty per the guard above.
    let earliest = colors.keys().next().copied().unwrap_or(today);
    let latest = colors.keys().next_back().copied().unwrap_or(today);

    let is_rest = |d: DateKey| rest_days.contains(&d.iso_weekday());
    let preserving =
        |d: DateKey| colors.get(&d) == Some(&DayColor::Green) || freezes.contains(d);

    // ─── Current: walk backward from today ───
    let mut current = 0u32;
    let mut cursor = today;
    if !is_rest(cursor) && !preserving(cursor) {
        cursor = cursor.pred();
    }
    while cursor >= earliest {
        if is_rest(cursor) {
            cursor = cursor.pred();
            continue;
        }
        if !preserving(cursor) {
            break;
        }
        current += 1;
        if cursor == earliest {
            break;
        }
        cursor = cursor.pred();
    }

    // ─── Best: forward scan over the observed span ───
    let mut best = 0u32;
    let mut run = 0u32;
    for d in earliest.range_to(latest) {
        if is_rest(d) {
            continue;
        }
        if preserving(d) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    // The run ending today can extend past the last classified day (e.g. a
    // freeze consumed for today before it has a color).
    best = best.max(current);

    // ─── Last green & gap ───
    let last_green = colors
        .iter()
        .rev()
        .find(|(_, c)| **c == DayColor::Green)
        .map(|(d, _)| *d);
    let days_since_last_green = last_green.map(|d| today.days_since(d));

    Streak {
        current,
        best,
        last_green,
        days_since_last_green,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    /// Build a history of consecutive days ending at `end`, oldest first.
    fn run_ending(end: &str, colors: &[DayColor]) -> Vec<(DateKey, DayColor)> {
        let end = d(end);
        colors
            .iter()
            .rev()
            .enumerate()
            .map(|(back, c)| (end.back(back as u64), *c))
            .rev()
            .collect()
    }

    const G: DayColor = DayColor::Green;
    const Y: DayColor = DayColor::Yellow;
    const R: DayColor = DayColor::Red;
    const E: DayColor = DayColor::Empty;

    #[test]
    fn empty_history_is_all_zeroes() {
        let s = compute(&[], &FreezeRecord::default(), &[], d("2025-03-09"));
        assert_eq!(s, Streak::default());
    }

    #[test]
    fn five_consecutive_greens() {
        let history = run_ending("2025-03-07", &[G, G, G, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 5);
        assert_eq!(s.best, 5);
        assert_eq!(s.last_green, Some(d("2025-03-07")));
        assert_eq!(s.days_since_last_green, Some(0));
    }

    #[test]
    fn red_day_breaks_the_run() {
        let history = run_ending("2025-03-07", &[G, G, R, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 2);
        assert_eq!(s.best, 2);
    }

    #[test]
    fn empty_color_breaks_like_a_miss() {
        let history = run_ending("2025-03-07", &[G, G, E, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 2);
    }

    #[test]
    fn rest_day_neither_breaks_nor_extends() {
        // 2025-03-05 is a Wednesday; make Wednesday a rest day and color it red.
        let history = run_ending("2025-03-07", &[G, G, R, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[3], d("2025-03-07"));
        assert_eq!(s.current, 4, "run spans the rest day without counting it");
        assert_eq!(s.best, 4);
    }

    #[test]
    fn freeze_preserves_a_red_day_and_counts() {
        let history = run_ending("2025-03-07", &[G, G, R, G, G]);
        let mut freezes = FreezeRecord::default();
        freezes.insert(d("2025-03-05"));
        let s = compute(&history, &freezes, &[], d("2025-03-07"));
        assert_eq!(s.current, 5, "frozen day preserves and counts");
        // The stored color is untouched; last green skips the frozen red day.
        assert_eq!(s.last_green, Some(d("2025-03-07")));
    }

    #[test]
    fn unfinished_today_does_not_break_yesterdays_run() {
        // Today is red so far (nothing checked yet); the run through yesterday
        // stands until the day is over.
        let history = run_ending("2025-03-07", &[G, G, G, R]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 3);
        // Yesterday already red: the streak is genuinely broken.
        let history = run_ending("2025-03-07", &[G, G, R, R]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 0);
    }

    #[test]
    fn today_absent_from_history_gets_the_same_grace() {
        let history = run_ending("2025-03-06", &[G, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 3);
        // Two unmeasured days is a real gap, not an in-progress day.
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-08"));
        assert_eq!(s.current, 0);
    }

    #[test]
    fn best_remembers_an_older_longer_run() {
        let history = run_ending("2025-03-10", &[G, G, G, G, R, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-10"));
        assert_eq!(s.current, 2);
        assert_eq!(s.best, 4);
    }

    #[test]
    fn scan_stops_at_earliest_observed_day() {
        // Only three days of data; nothing before them can be claimed.
        let history = run_ending("2025-03-07", &[G, G, G]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.current, 3);
    }

    #[test]
    fn gap_since_last_green_counts_calendar_days() {
        let history = run_ending("2025-03-04", &[G, R, R]);
        let s = compute(&history, &FreezeRecord::default(), &[], d("2025-03-07"));
        assert_eq!(s.last_green, Some(d("2025-03-02")));
        assert_eq!(s.days_since_last_green, Some(5));
        assert_eq!(s.current, 0);
    }

    #[test]
    fn freeze_on_today_without_a_color_counts() {
        let history = run_ending("2025-03-06", &[G, G]);
        let mut freezes = FreezeRecord::default();
        freezes.insert(d("2025-03-07"));
        let s = compute(&history, &freezes, &[], d("2025-03-07"));
        assert_eq!(s.current, 3);
        assert_eq!(s.best, 3);
    }

    #[test]
    fn all_rest_days_yield_zero_without_breaking() {
        // Every day is a rest day; the walk runs to the floor and counts nothing.
        let history = run_ending("2025-03-07", &[R, R, R]);
        let s = compute(&history, &FreezeRecord::default(), &[1, 2, 3, 4, 5, 6, 7], d("2025-03-07"));
        assert_eq!(s.current, 0);
        assert_eq!(s.best, 0);
    }
}
