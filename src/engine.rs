//! Engine facade.
//!
//! Owns the wiring: gateway reads behind the TTL cache, derived views from
//! the pure compute modules, writes through the offline queue, freeze ledger
//! and event bus. Hosts construct one `Engine` per signed-in user and clone
//! it freely; clones share state.
//!
//! "Today" is always a parameter, never read from a clock, so every derived
//! view is reproducible.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cache::{keys, ClientCache};
use crate::classify;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::freeze::{Allowance, FreezeLedger, FreezeOutcome};
use crate::gateway::RemoteGateway;
use crate::milestones::{
    self, MilestoneProgress, NextMilestones, STREAK_MILESTONES, TOTAL_GREEN_MILESTONES,
};
use crate::model::{
    ActivityKey, ActivityLogEntry, DailyCheck, DailyLog, DateKey, DayColor, RoutineItem,
};
use crate::queue::{Delivery, FlushOutcome, MutationOp, OfflineMutationQueue};
use crate::storage::KeyValueStorage;
use crate::streak::{self, Streak};

/// Everything the home screen needs in one view.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub streak: Streak,
    pub total_green_days: u32,
    pub next: NextMilestones,
    pub streak_progress: Option<MilestoneProgress>,
    pub total_progress: Option<MilestoneProgress>,
}

struct EngineInner {
    config: EngineConfig,
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<ClientCache>,
    queue: OfflineMutationQueue,
    freezes: FreezeLedger,
    bus: EventBus,
}

/// The habit progress engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Wire the engine together, restoring the freeze ledger and offline
    /// queue from device storage.
    pub async fn new(
        config: EngineConfig,
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::Config)?;
        let cache = Arc::new(ClientCache::new(Duration::from_secs(config.cache_ttl_secs)));
        let freezes = FreezeLedger::load(storage.clone()).await?;
        let queue = OfflineMutationQueue::load(
            gateway.clone(),
            storage,
            cache.clone(),
            Some(Duration::from_secs(config.network_timeout_secs)),
        )
        .await?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                gateway,
                cache,
                queue,
                freezes,
                bus: EventBus::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Observe engine change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.bus.subscribe()
    }

    /// Writes waiting for connectivity ("offline, N queued").
    pub fn pending_mutations(&self) -> usize {
        self.inner.queue.size()
    }

    // ─── Reads (cache-aside) ──────────────────────────────────────────────────

    pub async fn routine_items(&self) -> Result<Vec<RoutineItem>, EngineError> {
        if let Some(hit) = self.inner.cache.get(keys::ROUTINES) {
            return Ok(hit);
        }
        let items = self.inner.gateway.read_routine_items().await?;
        self.inner.cache.set(keys::ROUTINES, &items);
        Ok(items)
    }

    pub async fn checks(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyCheck>, EngineError> {
        let key = keys::checks(start, end);
        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit);
        }
        let checks = self.inner.gateway.read_checks(start, end).await?;
        self.inner.cache.set(&key, &checks);
        Ok(checks)
    }

    pub async fn daily_log(&self, date: DateKey) -> Result<Option<DailyLog>, EngineError> {
        let key = keys::daily_log(date);
        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit);
        }
        let log = self.inner.gateway.read_daily_log(date).await?;
        self.inner.cache.set(&key, &log);
        Ok(log)
    }

    async fn daily_logs(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyLog>, EngineError> {
        let key = keys::daily_logs(start, end);
        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit);
        }
        let logs = self.inner.gateway.read_daily_logs(start, end).await?;
        self.inner.cache.set(&key, &logs);
        Ok(logs)
    }

    // ─── Derived views ────────────────────────────────────────────────────────

    /// Color of a single day.
    pub async fn day_color(&self, date: DateKey) -> Result<DayColor, EngineError> {
        let key = keys::day_color(date);
        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit);
        }
        let items = self.routine_items().await?;
        let checks = self.checks(date, date).await?;
        let log = self.daily_log(date).await?;
        let color = classify::classify(date, &items, &checks, log.as_ref());
        self.inner
            .cache
            .set_with_ttl(&key, &color, self.derived_ttl());
        Ok(color)
    }

    /// Colors for every day in `start..=end`, via batch reads.
    pub async fn day_colors(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<(DateKey, DayColor)>, EngineError> {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        let items = self.routine_items().await?;
        let checks = self.checks(start, end).await?;
        let logs = self.daily_logs(start, end).await?;
        let logs_by_date: HashMap<DateKey, &DailyLog> =
            logs.iter().map(|l| (l.date, l)).collect();
        Ok(start
            .range_to(end)
            .map(|date| {
                let color = classify::classify(
                    date,
                    &items,
                    &checks,
                    logs_by_date.get(&date).copied(),
                );
                (date, color)
            })
            .collect())
    }

    /// Streak state as of `today`, over the configured history window.
    pub async fn streak(&self, today: DateKey) -> Result<Streak, EngineError> {
        let key = keys::derived("streak", today);
        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit);
        }
        let history = self.history(today).await?;
        let freezes = self.inner.freezes.snapshot();
        let streak = streak::compute(&history, &freezes, &self.inner.config.rest_days, today);
        self.inner
            .cache
            .set_with_ttl(&key, &streak, self.derived_ttl());
        Ok(streak)
    }

    /// Milestone progress for the home screen.
    pub async fn progress(&self, today: DateKey) -> Result<ProgressView, EngineError> {
        let streak = self.streak(today).await?;
        let total_green_days = self.total_green_days(today).await?;
        let horizon = self.inner.config.milestone_horizon;
        Ok(ProgressView {
            streak,
            total_green_days,
            next: milestones::next_milestone(streak.current, total_green_days),
            streak_progress: milestones::progress(STREAK_MILESTONES, streak.current, horizon),
            total_progress: milestones::progress(TOTAL_GREEN_MILESTONES, total_green_days, horizon),
        })
    }

    /// Green days in the history window ending at `today`. Bounded by
    /// `history_days`, not an all-time count.
    pub async fn total_green_days(&self, today: DateKey) -> Result<u32, EngineError> {
        let key = keys::derived("total_green", today);
        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit);
        }
        let total = self
            .history(today)
            .await?
            .iter()
            .filter(|(_, color)| *color == DayColor::Green)
            .count() as u32;
        self.inner
            .cache
            .set_with_ttl(&key, &total, self.derived_ttl());
        Ok(total)
    }

    // ─── Writes ───────────────────────────────────────────────────────────────

    /// Toggle a habit check. Never blocks on connectivity; offline writes
    /// park in the queue and the caller still succeeds.
    pub async fn set_check(
        &self,
        item_id: &str,
        date: DateKey,
        done: bool,
    ) -> Result<Delivery, EngineError> {
        let check = DailyCheck {
            item_id: item_id.to_string(),
            date,
            done,
        };
        let delivery = self
            .inner
            .queue
            .enqueue_or_send(MutationOp::UpsertCheck { check })
            .await?;
        self.after_write(delivery, EngineEvent::ChecksChanged { date });
        Ok(delivery)
    }

    /// Set the day mode / workout flags for a date.
    pub async fn set_daily_log(&self, log: DailyLog) -> Result<Delivery, EngineError> {
        let date = log.date;
        let delivery = self
            .inner
            .queue
            .enqueue_or_send(MutationOp::UpsertDailyLog { log })
            .await?;
        self.after_write(delivery, EngineEvent::DailyLogChanged { date });
        Ok(delivery)
    }

    /// Record an activity entry. Validation happens before anything reaches
    /// the queue; the returned entry carries the client-generated id.
    pub async fn log_activity(
        &self,
        date: DateKey,
        activity: ActivityKey,
        value: f64,
        notes: Option<String>,
    ) -> Result<ActivityLogEntry, EngineError> {
        let entry = ActivityLogEntry::new(date, activity, value, notes)?;
        let delivery = self
            .inner
            .queue
            .enqueue_or_send(MutationOp::InsertActivityLog {
                entry: entry.clone(),
            })
            .await?;
        self.after_write(delivery, EngineEvent::ActivityLogged { date });
        Ok(entry)
    }

    /// String-keyed variant for host bridges; rejects malformed date keys
    /// and unknown activity keys synchronously.
    pub async fn log_activity_raw(
        &self,
        date: &str,
        activity: &str,
        value: f64,
        notes: Option<String>,
    ) -> Result<ActivityLogEntry, EngineError> {
        let date = DateKey::parse(date)?;
        let activity = ActivityKey::parse(activity)?;
        self.log_activity(date, activity, value, notes).await
    }

    pub async fn delete_activity(
        &self,
        id: Uuid,
        date: DateKey,
    ) -> Result<Delivery, EngineError> {
        let delivery = self
            .inner
            .queue
            .enqueue_or_send(MutationOp::DeleteActivityLog { id, date })
            .await?;
        self.after_write(delivery, EngineEvent::ActivityDeleted { date });
        Ok(delivery)
    }

    // ─── Freezes ──────────────────────────────────────────────────────────────

    /// Consume a streak freeze for `date` under the configured plan tier.
    pub async fn use_freeze(&self, date: DateKey) -> Result<FreezeOutcome, EngineError> {
        let outcome = self
            .inner
            .freezes
            .use_freeze(date, self.inner.config.plan_tier)
            .await?;
        if outcome == FreezeOutcome::Applied {
            // Streaks fold in the ledger; recompute them.
            self.inner.cache.clear(Some(keys::DERIVED_PREFIX));
            self.inner.bus.emit(EngineEvent::FreezeConsumed { date });
        }
        Ok(outcome)
    }

    pub fn can_use_freeze(&self, date: DateKey) -> bool {
        self.inner.freezes.can_use(date, self.inner.config.plan_tier)
    }

    pub fn freezes_remaining(&self, date: DateKey) -> Allowance {
        self.inner.freezes.remaining(date, self.inner.config.plan_tier)
    }

    // ─── Lifecycle hooks ──────────────────────────────────────────────────────

    /// Host signal: connectivity returned.
    pub async fn on_reconnect(&self) -> FlushOutcome {
        self.flush_and_report().await
    }

    /// Host signal: app moved to the foreground.
    pub async fn on_foreground(&self) -> FlushOutcome {
        self.flush_and_report().await
    }

    /// Pull-to-refresh: drop every cached read, flush the queue, then tell
    /// observers to re-read.
    pub async fn request_refresh(&self) -> FlushOutcome {
        self.inner.cache.clear(None);
        let outcome = self.flush_and_report().await;
        self.inner.bus.emit(EngineEvent::RefreshRequested);
        outcome
    }

    /// Settings screens call this after editing routine items elsewhere.
    pub fn notify_routines_changed(&self) {
        self.inner.cache.clear(Some(keys::ROUTINES));
        self.inner.cache.clear(Some(keys::DAYCOLOR_PREFIX));
        self.inner.cache.clear(Some(keys::DERIVED_PREFIX));
        self.inner.bus.emit(EngineEvent::RoutinesChanged);
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    async fn history(&self, today: DateKey) -> Result<Vec<(DateKey, DayColor)>, EngineError> {
        let span = u64::from(self.inner.config.history_days.saturating_sub(1));
        self.day_colors(today.back(span), today).await
    }

    fn after_write(&self, delivery: Delivery, event: EngineEvent) {
        if delivery == Delivery::Queued {
            self.inner.bus.emit(EngineEvent::MutationQueued {
                pending: self.inner.queue.size(),
            });
        }
        self.inner.bus.emit(event);
    }

    async fn flush_and_report(&self) -> FlushOutcome {
        let outcome = self.inner.queue.flush().await;
        if outcome.succeeded > 0 || outcome.failed > 0 {
            self.inner.bus.emit(EngineEvent::QueueFlushed {
                delivered: outcome.succeeded,
                pending: self.inner.queue.size(),
            });
        }
        outcome
    }

    fn derived_ttl(&self) -> Duration {
        Duration::from_secs(self.inner.config.derived_ttl_secs)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
