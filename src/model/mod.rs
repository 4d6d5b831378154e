//! Core domain records.
//!
//! These mirror the remote store's rows plus the derived values computed on
//! device. Everything here is plain data; behavior lives in the classifier,
//! streak, and queue modules.

pub mod date_key;

pub use date_key::DateKey;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

// ─── Routine items & checks ──────────────────────────────────────────────────

/// Where a routine item sits in the daily checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Morning,
    Anytime,
    Night,
}

/// A habit the user tracks. Owned by the user, edited in settings.
///
/// Items are soft-disabled (`active = false`) rather than deleted so that
/// historical references stay resolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineItem {
    pub id: String,
    pub label: String,
    pub section: Section,
    /// Mandatory for a green day.
    pub non_negotiable: bool,
    /// ISO weekdays (1 = Monday … 7 = Sunday) the item applies to.
    /// `None` means every day.
    pub days_of_week: Option<Vec<u8>>,
    pub active: bool,
}

impl RoutineItem {
    /// Whether this item is expected on the given date.
    pub fn applies_on(&self, date: DateKey) -> bool {
        if !self.active {
            return false;
        }
        match &self.days_of_week {
            Some(days) => days.contains(&date.iso_weekday()),
            None => true,
        }
    }

    /// Workout items accept the daily log's rowing/weights flags as
    /// alternative satisfaction paths.
    pub fn is_workout(&self) -> bool {
        self.label.to_lowercase().contains("workout")
    }
}

/// One check state per (item, date). Never deleted, only flipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCheck {
    pub item_id: String,
    pub date: DateKey,
    pub done: bool,
}

// ─── Daily log ───────────────────────────────────────────────────────────────

/// Day-level mode the user can set. Carried for display; does not alter
/// classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayMode {
    #[default]
    Normal,
    Travel,
    Sick,
}

/// At most one per date. The two workout flags are OR-alternatives to a
/// checked workout item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: DateKey,
    #[serde(default)]
    pub mode: DayMode,
    #[serde(default)]
    pub did_rowing: bool,
    #[serde(default)]
    pub did_weights: bool,
}

impl DailyLog {
    pub fn new(date: DateKey) -> Self {
        Self {
            date,
            mode: DayMode::Normal,
            did_rowing: false,
            did_weights: false,
        }
    }
}

// ─── Activity log ────────────────────────────────────────────────────────────

/// Closed catalog of loggable activities. Unknown keys are rejected at the
/// boundary, before anything reaches the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKey {
    RowingMeters,
    WeightsSessions,
    Steps,
    RunKilometers,
    ReadingMinutes,
}

impl ActivityKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowingMeters => "rowing_meters",
            Self::WeightsSessions => "weights_sessions",
            Self::Steps => "steps",
            Self::RunKilometers => "run_kilometers",
            Self::ReadingMinutes => "reading_minutes",
        }
    }

    /// Unit recorded alongside each entry.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::RowingMeters => "m",
            Self::WeightsSessions => "sessions",
            Self::Steps => "steps",
            Self::RunKilometers => "km",
            Self::ReadingMinutes => "min",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "rowing_meters" => Ok(Self::RowingMeters),
            "weights_sessions" => Ok(Self::WeightsSessions),
            "steps" => Ok(Self::Steps),
            "run_kilometers" => Ok(Self::RunKilometers),
            "reading_minutes" => Ok(Self::ReadingMinutes),
            other => Err(EngineError::UnknownActivity(other.to_string())),
        }
    }
}

/// Append-only activity record. Inserted or deleted, never updated.
///
/// The id is generated on device so a retried insert stays idempotent at the
/// remote boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub date: DateKey,
    pub activity: ActivityKey,
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ActivityLogEntry {
    /// Build a validated entry. Rejects non-finite and negative values.
    pub fn new(
        date: DateKey,
        activity: ActivityKey,
        value: f64,
        notes: Option<String>,
    ) -> Result<Self, EngineError> {
        if !value.is_finite() || value < 0.0 {
            return Err(EngineError::InvalidActivityValue {
                key: activity.as_str().to_string(),
                reason: format!("expected a non-negative finite number, got {value}"),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            date,
            activity,
            value,
            unit: activity.unit().to_string(),
            notes,
        })
    }
}

// ─── Derived values ──────────────────────────────────────────────────────────

/// Completion classification of one calendar day. Derived, never stored
/// remotely; cached locally with a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayColor {
    /// Every applicable non-negotiable done.
    Green,
    /// Exactly one missed.
    Yellow,
    /// Two or more missed.
    Red,
    /// No applicable non-negotiables configured; nothing to measure.
    Empty,
}

/// Subscription tier. Gates the freeze quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Premium,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
