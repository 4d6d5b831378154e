// SPDX-License-Identifier: MIT
//! Milestone thresholds and progress.
//!
//! Two fixed ascending ladders: streak length and cumulative green days.
//! Stateless; the next milestone is always the smallest threshold strictly
//! greater than the current value.

use serde::Serialize;

/// One celebratory threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub threshold: u32,
    pub title: &'static str,
    pub emoji: &'static str,
}

pub const STREAK_MILESTONES: &[Milestone] = &[
    Milestone { threshold: 3, title: "Three-Day Spark", emoji: "✨" },
    Milestone { threshold: 7, title: "One Week Strong", emoji: "🔥" },
    Milestone { threshold: 14, title: "Two-Week Roll", emoji: "⚡" },
    Milestone { threshold: 21, title: "Twenty-One Club", emoji: "🌟" },
    Milestone { threshold: 30, title: "Thirty Days", emoji: "🏅" },
    Milestone { threshold: 50, title: "Fifty Club", emoji: "💪" },
    Milestone { threshold: 75, title: "Diamond Run", emoji: "💎" },
    Milestone { threshold: 100, title: "Century", emoji: "💯" },
    Milestone { threshold: 150, title: "Unstoppable", emoji: "🚀" },
    Milestone { threshold: 200, title: "Two Hundred", emoji: "🏔" },
    Milestone { threshold: 365, title: "Full Year", emoji: "👑" },
];

pub const TOTAL_GREEN_MILESTONES: &[Milestone] = &[
    Milestone { threshold: 10, title: "First Ten", emoji: "🌱" },
    Milestone { threshold: 25, title: "Twenty-Five Greens", emoji: "🌿" },
    Milestone { threshold: 50, title: "Fifty Greens", emoji: "🌳" },
    Milestone { threshold: 100, title: "Hundred Greens", emoji: "💯" },
    Milestone { threshold: 250, title: "Green Machine", emoji: "🏆" },
    Milestone { threshold: 500, title: "Five Hundred", emoji: "🎖" },
    Milestone { threshold: 1000, title: "Legend", emoji: "👑" },
];

/// Next milestones for both ladders. Either side is `None` once its ladder
/// is exhausted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NextMilestones {
    pub streak_next: Option<&'static Milestone>,
    pub total_next: Option<&'static Milestone>,
}

/// Smallest threshold strictly greater than `current`, per ladder.
pub fn next_milestone(current_streak: u32, total_green_days: u32) -> NextMilestones {
    NextMilestones {
        streak_next: next_in(STREAK_MILESTONES, current_streak),
        total_next: next_in(TOTAL_GREEN_MILESTONES, total_green_days),
    }
}

fn next_in(table: &'static [Milestone], current: u32) -> Option<&'static Milestone> {
    table.iter().find(|m| m.threshold > current)
}

/// Progress-bar state toward the next threshold in `table`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MilestoneProgress {
    pub milestone: &'static Milestone,
    /// Percent of the span between the previous and next threshold, 0–100.
    pub percent: u8,
    pub remaining: u32,
}

/// Progress toward the next milestone in `table`.
///
/// Returns `None` when the ladder is exhausted or when more than `horizon`
/// units remain; a bar sitting near zero for weeks demotivates more than it
/// helps, so far-off milestones are not shown.
pub fn progress(
    table: &'static [Milestone],
    current: u32,
    horizon: u32,
) -> Option<MilestoneProgress> {
    let next = next_in(table, current)?;
    let remaining = next.threshold - current;
    if remaining > horizon {
        return None;
    }
    let prev = table
        .iter()
        .take_while(|m| m.threshold <= current)
        .last()
        .map(|m| m.threshold)
        .unwrap_or(0);
    let span = next.threshold.saturating_sub(prev).max(1);
    let percent = ((current.saturating_sub(prev)) * 100 / span).min(100) as u8;
    Some(MilestoneProgress {
        milestone: next,
        percent,
        remaining,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_strictly_greater() {
        let next = next_milestone(5, 5);
        assert_eq!(next.streak_next.map(|m| m.threshold), Some(7));
        assert_eq!(next.total_next.map(|m| m.threshold), Some(10));

        // Sitting exactly on a threshold advances to the one after it.
        let next = next_milestone(7, 10);
        assert_eq!(next.streak_next.map(|m| m.threshold), Some(14));
        assert_eq!(next.total_next.map(|m| m.threshold), Some(25));
    }

    #[test]
    fn exhausted_ladder_has_no_next() {
        let next = next_milestone(365, 1000);
        assert!(next.streak_next.is_none());
        assert!(next.total_next.is_none());
        let next = next_milestone(400, 2000);
        assert!(next.streak_next.is_none());
        assert!(next.total_next.is_none());
    }

    #[test]
    fn tables_are_strictly_ascending() {
        for table in [STREAK_MILESTONES, TOTAL_GREEN_MILESTONES] {
            for pair in table.windows(2) {
                assert!(pair[0].threshold < pair[1].threshold);
            }
        }
    }

    #[test]
    fn percent_spans_previous_to_next() {
        // Between 3 and 7, a streak of 5 is halfway.
        let p = progress(STREAK_MILESTONES, 5, 30).unwrap();
        assert_eq!(p.milestone.threshold, 7);
        assert_eq!(p.percent, 50);
        assert_eq!(p.remaining, 2);

        // Before the first threshold, progress is measured from zero.
        let p = progress(STREAK_MILESTONES, 2, 30).unwrap();
        assert_eq!(p.milestone.threshold, 3);
        assert_eq!(p.percent, 66);

        // Sitting on a threshold means zero progress toward the next.
        let p = progress(STREAK_MILESTONES, 7, 30).unwrap();
        assert_eq!(p.milestone.threshold, 14);
        assert_eq!(p.percent, 0);
    }

    #[test]
    fn far_off_milestones_are_suppressed() {
        // 150 greens: next is 250, remaining 100 > horizon 30.
        assert!(progress(TOTAL_GREEN_MILESTONES, 150, 30).is_none());
        // Within the horizon it shows again.
        assert!(progress(TOTAL_GREEN_MILESTONES, 230, 30).is_some());
        // No ladder left, nothing to show.
        assert!(progress(STREAK_MILESTONES, 365, 1000).is_none());
    }
}
