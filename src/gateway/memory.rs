//! In-memory gateway fake.
//!
//! Holds the remote state in maps keyed the same way the backend keys its
//! rows, so write idempotence behaves like the real thing. An `online`
//! switch simulates connectivity loss, and a write log records every
//! attempted mutation for exactly-once assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{GatewayError, RemoteGateway};
use crate::model::{ActivityLogEntry, DailyCheck, DailyLog, DateKey, RoutineItem};

#[derive(Default)]
struct RemoteState {
    routine_items: Vec<RoutineItem>,
    /// Keyed by (item_id, date) — the backend's natural key for checks.
    checks: HashMap<(String, DateKey), DailyCheck>,
    daily_logs: HashMap<DateKey, DailyLog>,
    activities: HashMap<Uuid, ActivityLogEntry>,
    /// One entry per write call that reached the "server", duplicates included.
    write_log: Vec<String>,
}

#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<RemoteState>,
    offline: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip simulated connectivity. While offline every call fails with
    /// `GatewayError::Network`.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("simulated offline".into()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().expect("memory gateway poisoned")
    }

    // ── Seeding & assertions ──────────────────────────────────────────────────

    pub fn seed_routine_items(&self, items: Vec<RoutineItem>) {
        self.lock().routine_items = items;
    }

    pub fn seed_check(&self, check: DailyCheck) {
        self.lock()
            .checks
            .insert((check.item_id.clone(), check.date), check);
    }

    pub fn seed_daily_log(&self, log: DailyLog) {
        self.lock().daily_logs.insert(log.date, log);
    }

    /// Every write call seen so far, in arrival order.
    pub fn write_log(&self) -> Vec<String> {
        self.lock().write_log.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().write_log.len()
    }

    pub fn activity_count(&self) -> usize {
        self.lock().activities.len()
    }

    pub fn stored_check(&self, item_id: &str, date: DateKey) -> Option<DailyCheck> {
        self.lock()
            .checks
            .get(&(item_id.to_string(), date))
            .cloned()
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn read_routine_items(&self) -> Result<Vec<RoutineItem>, GatewayError> {
        self.check_online()?;
        Ok(self.lock().routine_items.clone())
    }

    async fn read_checks(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyCheck>, GatewayError> {
        self.check_online()?;
        let mut checks: Vec<DailyCheck> = self
            .lock()
            .checks
            .values()
            .filter(|c| c.date >= start && c.date <= end)
            .cloned()
            .collect();
        checks.sort_by(|a, b| (a.date, &a.item_id).cmp(&(b.date, &b.item_id)));
        Ok(checks)
    }

    async fn read_daily_log(&self, date: DateKey) -> Result<Option<DailyLog>, GatewayError> {
        self.check_online()?;
        Ok(self.lock().daily_logs.get(&date).cloned())
    }

    async fn read_daily_logs(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyLog>, GatewayError> {
        self.check_online()?;
        let mut logs: Vec<DailyLog> = self
            .lock()
            .daily_logs
            .values()
            .filter(|l| l.date >= start && l.date <= end)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    async fn upsert_check(&self, check: &DailyCheck) -> Result<(), GatewayError> {
        self.check_online()?;
        let mut state = self.lock();
        state
            .write_log
            .push(format!("upsert_check:{}:{}", check.item_id, check.date));
        state
            .checks
            .insert((check.item_id.clone(), check.date), check.clone());
        Ok(())
    }

    async fn upsert_daily_log(&self, log: &DailyLog) -> Result<(), GatewayError> {
        self.check_online()?;
        let mut state = self.lock();
        state.write_log.push(format!("upsert_daily_log:{}", log.date));
        state.daily_logs.insert(log.date, log.clone());
        Ok(())
    }

    async fn insert_activity_log(&self, entry: &ActivityLogEntry) -> Result<(), GatewayError> {
        self.check_online()?;
        let mut state = self.lock();
        state
            .write_log
            .push(format!("insert_activity_log:{}", entry.id));
        // Keyed by client id — a re-delivered insert lands on the same row.
        state.activities.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete_activity_log(&self, id: Uuid) -> Result<(), GatewayError> {
        self.check_online()?;
        let mut state = self.lock();
        state.write_log.push(format!("delete_activity_log:{id}"));
        // Deleting an absent row is success, same as the backend.
        state.activities.remove(&id);
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
