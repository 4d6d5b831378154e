//! Day classification.
//!
//! Collapses one day's raw data (routine items, checks, daily log) into a
//! single `DayColor`. Pure and deterministic: identical inputs always produce
//! the identical color, which is what makes the result safe to cache and to
//! feed into streak computation.

use std::collections::HashSet;

use crate::model::{DailyCheck, DailyLog, DateKey, DayColor, RoutineItem};

/// Classify a single calendar day.
///
/// Only non-negotiable items that apply on `date` are measured. With none
/// applicable there is nothing to grade and the day is `Empty`. A workout
/// item counts as satisfied through its own check or either workout flag on
/// the daily log; every other item only through its own check.
pub fn classify(
    date: DateKey,
    items: &[RoutineItem],
    checks: &[DailyCheck],
    log: Option<&DailyLog>,
) -> DayColor {
    let done_today: HashSet<&str> = checks
        .iter()
        .filter(|c| c.date == date && c.done)
        .map(|c| c.item_id.as_str())
        .collect();

    let mut measured = 0usize;
    let mut missed = 0usize;

    for item in items {
        if !item.non_negotiable || !item.applies_on(date) {
            continue;
        }
        measured += 1;

        let mut satisfied = done_today.contains(item.id.as_str());
        if !satisfied && item.is_workout() {
            satisfied = log.map(|l| l.did_rowing || l.did_weights).unwrap_or(false);
        }
        if !satisfied {
            missed += 1;
        }
    }

    if measured == 0 {
        return DayColor::Empty;
    }
    match missed {
        0 => DayColor::Green,
        1 => DayColor::Yellow,
        _ => DayColor::Red,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayMode, Section};

    fn date() -> DateKey {
        DateKey::parse("2025-03-03").unwrap()
    }

    fn item(id: &str, label: &str, non_negotiable: bool) -> RoutineItem {
        RoutineItem {
            id: id.into(),
            label: label.into(),
            section: Section::Anytime,
            non_negotiable,
            days_of_week: None,
            active: true,
        }
    }

    fn check(id: &str, done: bool) -> DailyCheck {
        DailyCheck {
            item_id: id.into(),
            date: date(),
            done,
        }
    }

    fn log(did_rowing: bool, did_weights: bool) -> DailyLog {
        DailyLog {
            date: date(),
            mode: DayMode::Normal,
            did_rowing,
            did_weights,
        }
    }

    #[test]
    fn no_non_negotiables_is_empty() {
        let items = vec![item("a", "Journal", false), item("b", "Stretch", false)];
        let checks = vec![check("a", true)];
        assert_eq!(classify(date(), &items, &checks, None), DayColor::Empty);
        assert_eq!(classify(date(), &[], &[], None), DayColor::Empty);
    }

    #[test]
    fn all_done_is_green() {
        let items = vec![item("a", "Meditate", true), item("b", "Read", true)];
        let checks = vec![check("a", true), check("b", true)];
        assert_eq!(classify(date(), &items, &checks, None), DayColor::Green);
    }

    #[test]
    fn one_miss_yellow_two_red() {
        let items = vec![
            item("a", "Meditate", true),
            item("b", "Read", true),
            item("c", "Stretch", true),
        ];
        let two_done = vec![check("a", true), check("b", true)];
        assert_eq!(classify(date(), &items, &two_done, None), DayColor::Yellow);

        let one_done = vec![check("a", true)];
        assert_eq!(classify(date(), &items, &one_done, None), DayColor::Red);
    }

    #[test]
    fn workout_satisfied_by_any_path() {
        let items = vec![item("w", "Workout", true)];

        // Own check.
        let checks = vec![check("w", true)];
        assert_eq!(classify(date(), &items, &checks, None), DayColor::Green);

        // Rowing flag, no check.
        let rowing = log(true, false);
        assert_eq!(classify(date(), &items, &[], Some(&rowing)), DayColor::Green);

        // Weights flag, no check.
        let weights = log(false, true);
        assert_eq!(classify(date(), &items, &[], Some(&weights)), DayColor::Green);

        // Nothing at all.
        assert_eq!(classify(date(), &items, &[], None), DayColor::Yellow);
    }

    #[test]
    fn workout_flags_do_not_satisfy_other_items() {
        let items = vec![item("r", "Read", true)];
        let l = log(true, true);
        assert_eq!(classify(date(), &items, &[], Some(&l)), DayColor::Yellow);
    }

    #[test]
    fn unchecked_and_false_checks_are_misses() {
        let items = vec![item("a", "Meditate", true)];
        let flipped_off = vec![check("a", false)];
        assert_eq!(classify(date(), &items, &flipped_off, None), DayColor::Yellow);
    }

    #[test]
    fn checks_for_other_dates_are_ignored() {
        let items = vec![item("a", "Meditate", true)];
        let other_day = vec![DailyCheck {
            item_id: "a".into(),
            date: DateKey::parse("2025-03-02").unwrap(),
            done: true,
        }];
        assert_eq!(classify(date(), &items, &other_day, None), DayColor::Yellow);
    }

    #[test]
    fn day_restricted_items_only_count_on_their_days() {
        // 2025-03-03 is a Monday.
        let mut weekend_only = item("a", "Long run", true);
        weekend_only.days_of_week = Some(vec![6, 7]);
        assert_eq!(classify(date(), &[weekend_only], &[], None), DayColor::Empty);
    }

    #[test]
    fn inactive_items_are_not_measured() {
        let mut retired = item("a", "Cold shower", true);
        retired.active = false;
        let live = item("b", "Read", true);
        let checks = vec![check("b", true)];
        assert_eq!(
            classify(date(), &[retired, live], &checks, None),
            DayColor::Green
        );
    }

    #[test]
    fn classification_is_reproducible() {
        let items = vec![item("a", "Workout", true), item("b", "Read", true)];
        let checks = vec![check("b", true)];
        let l = log(true, false);
        let first = classify(date(), &items, &checks, Some(&l));
        let second = classify(date(), &items, &checks, Some(&l));
        assert_eq!(first, second);
        assert_eq!(first, DayColor::Green);
    }
}
