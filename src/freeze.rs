//! Streak freeze ledger.
//!
//! A freeze is a consumable grace token: it marks one calendar date as
//! streak-preserving without touching the day's color. The ledger is a flat
//! list of frozen dates persisted in device-local storage; plan tier caps
//! how many can be consumed per calendar month.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{DateKey, PlanTier};
use crate::storage::{KeyValueStorage, StorageError};

/// Storage key the ledger persists under.
pub const FREEZES_KEY: &str = "freezes/used";

const FREE_MONTHLY_QUOTA: u32 = 1;

/// The set of dates a freeze has been consumed for. Append-only in normal
/// operation; serialized as a flat JSON list of date keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreezeRecord {
    dates: BTreeSet<DateKey>,
}

impl FreezeRecord {
    pub fn contains(&self, date: DateKey) -> bool {
        self.dates.contains(&date)
    }

    /// Returns `false` when the date was already present.
    pub fn insert(&mut self, date: DateKey) -> bool {
        self.dates.insert(date)
    }

    /// Freezes consumed in the given `YYYY-MM` month.
    pub fn used_in_month(&self, month: &str) -> u32 {
        self.dates
            .iter()
            .filter(|d| d.month_prefix() == month)
            .count() as u32
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// How many freezes the plan still allows this month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Allowance {
    Limited(u32),
    Unlimited,
}

/// Result of a freeze attempt. Quota exhaustion is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeOutcome {
    Applied,
    AlreadyFrozen,
    QuotaExhausted,
}

/// Persisted freeze ledger.
///
/// Reads are served from the in-memory record; every successful mutation is
/// written through to storage before it is acknowledged.
pub struct FreezeLedger {
    storage: Arc<dyn KeyValueStorage>,
    record: Mutex<FreezeRecord>,
    /// Serializes mutate-then-persist sequences so concurrent consumers
    /// cannot persist snapshots out of order.
    mutation_lock: tokio::sync::Mutex<()>,
}

impl FreezeLedger {
    /// Load the ledger from storage. A missing key is an empty ledger; an
    /// undecodable blob is surfaced as corruption, not silently reset.
    pub async fn load(storage: Arc<dyn KeyValueStorage>) -> Result<Self, StorageError> {
        let record = match storage.load(FREEZES_KEY).await? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                    key: FREEZES_KEY.to_string(),
                    reason: e.to_string(),
                })?
            }
            None => FreezeRecord::default(),
        };
        info!(used = record.len(), "freeze ledger loaded");
        Ok(Self {
            storage,
            record: Mutex::new(record),
            mutation_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Point-in-time copy of the record, for streak computation.
    pub fn snapshot(&self) -> FreezeRecord {
        self.lock().clone()
    }

    /// Whether `use_freeze` for this date would currently succeed.
    pub fn can_use(&self, date: DateKey, tier: PlanTier) -> bool {
        let record = self.lock();
        if record.contains(date) {
            return false;
        }
        match tier {
            PlanTier::Premium => true,
            PlanTier::Free => record.used_in_month(&date.month_prefix()) < FREE_MONTHLY_QUOTA,
        }
    }

    /// Freezes left in the month of `date`. Ignores the once-per-date rule.
    pub fn remaining(&self, date: DateKey, tier: PlanTier) -> Allowance {
        match tier {
            PlanTier::Premium => Allowance::Unlimited,
            PlanTier::Free => {
                let used = self.lock().used_in_month(&date.month_prefix());
                Allowance::Limited(FREE_MONTHLY_QUOTA.saturating_sub(used))
            }
        }
    }

    /// Consume a freeze for `date`.
    ///
    /// The once-per-date rule is enforced by membership check, not by the
    /// storage layer — the persisted form is a flat list. The quota is
    /// counted against the month of the frozen date. Acknowledged only after
    /// the new record is durably saved; on save failure the in-memory insert
    /// is rolled back.
    pub async fn use_freeze(
        &self,
        date: DateKey,
        tier: PlanTier,
    ) -> Result<FreezeOutcome, StorageError> {
        let _guard = self.mutation_lock.lock().await;

        let snapshot = {
            let mut record = self.lock();
            if record.contains(date) {
                return Ok(FreezeOutcome::AlreadyFrozen);
            }
            if tier == PlanTier::Free
                && record.used_in_month(&date.month_prefix()) >= FREE_MONTHLY_QUOTA
            {
                return Ok(FreezeOutcome::QuotaExhausted);
            }
            record.insert(date);
            record.clone()
        };

        let bytes = serde_json::to_vec(&snapshot).map_err(|e| StorageError::Corrupt {
            key: FREEZES_KEY.to_string(),
            reason: e.to_string(),
        })?;
        if let Err(e) = self.storage.save(FREEZES_KEY, &bytes).await {
            warn!(date = %date, error = %e, "freeze not persisted, rolling back");
            self.lock().dates.remove(&date);
            return Err(e);
        }

        info!(date = %date, "freeze consumed");
        Ok(FreezeOutcome::Applied)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FreezeRecord> {
        self.record.lock().expect("freeze ledger poisoned")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn d(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    async fn ledger() -> (Arc<MemoryStorage>, FreezeLedger) {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = FreezeLedger::load(storage.clone()).await.unwrap();
        (storage, ledger)
    }

    #[tokio::test]
    async fn free_tier_allows_one_per_month() {
        let (_, ledger) = ledger().await;
        assert_eq!(
            ledger.use_freeze(d("2025-03-05"), PlanTier::Free).await.unwrap(),
            FreezeOutcome::Applied
        );
        assert_eq!(
            ledger.use_freeze(d("2025-03-20"), PlanTier::Free).await.unwrap(),
            FreezeOutcome::QuotaExhausted
        );
        // Next calendar month the quota resets.
        assert_eq!(
            ledger.use_freeze(d("2025-04-02"), PlanTier::Free).await.unwrap(),
            FreezeOutcome::Applied
        );
    }

    #[tokio::test]
    async fn same_date_is_rejected_by_membership() {
        let (_, ledger) = ledger().await;
        ledger.use_freeze(d("2025-03-05"), PlanTier::Premium).await.unwrap();
        assert_eq!(
            ledger.use_freeze(d("2025-03-05"), PlanTier::Premium).await.unwrap(),
            FreezeOutcome::AlreadyFrozen
        );
    }

    #[tokio::test]
    async fn premium_is_unlimited_within_a_month() {
        let (_, ledger) = ledger().await;
        for day in ["2025-03-01", "2025-03-02", "2025-03-03", "2025-03-04"] {
            assert_eq!(
                ledger.use_freeze(d(day), PlanTier::Premium).await.unwrap(),
                FreezeOutcome::Applied
            );
        }
        assert_eq!(ledger.remaining(d("2025-03-10"), PlanTier::Premium), Allowance::Unlimited);
    }

    #[tokio::test]
    async fn remaining_and_can_use_track_the_quota() {
        let (_, ledger) = ledger().await;
        assert_eq!(ledger.remaining(d("2025-03-01"), PlanTier::Free), Allowance::Limited(1));
        assert!(ledger.can_use(d("2025-03-05"), PlanTier::Free));

        ledger.use_freeze(d("2025-03-05"), PlanTier::Free).await.unwrap();
        assert_eq!(ledger.remaining(d("2025-03-01"), PlanTier::Free), Allowance::Limited(0));
        assert!(!ledger.can_use(d("2025-03-20"), PlanTier::Free));
        // A different month is unaffected.
        assert!(ledger.can_use(d("2025-04-01"), PlanTier::Free));
    }

    #[tokio::test]
    async fn ledger_survives_reload() {
        let (storage, ledger) = ledger().await;
        ledger.use_freeze(d("2025-03-05"), PlanTier::Free).await.unwrap();
        drop(ledger);

        let reloaded = FreezeLedger::load(storage).await.unwrap();
        assert!(reloaded.snapshot().contains(d("2025-03-05")));
        assert_eq!(
            reloaded.use_freeze(d("2025-03-09"), PlanTier::Free).await.unwrap(),
            FreezeOutcome::QuotaExhausted
        );
    }

    #[tokio::test]
    async fn save_failure_rolls_back_the_insert() {
        let (storage, ledger) = ledger().await;
        storage.set_fail_writes(true);
        assert!(ledger.use_freeze(d("2025-03-05"), PlanTier::Free).await.is_err());
        assert!(!ledger.snapshot().contains(d("2025-03-05")));

        storage.set_fail_writes(false);
        assert_eq!(
            ledger.use_freeze(d("2025-03-05"), PlanTier::Free).await.unwrap(),
            FreezeOutcome::Applied
        );
    }

    #[tokio::test]
    async fn corrupt_blob_surfaces_as_corruption() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put_raw(FREEZES_KEY, b"{not json".to_vec());
        let err = FreezeLedger::load(storage)
            .await
            .err()
            .expect("load should fail on a corrupt blob");
        match err {
            StorageError::Corrupt { key, .. } => assert_eq!(key, FREEZES_KEY),
            other => panic!("expected corruption, got {other}"),
        }
    }

    #[test]
    fn record_serializes_as_flat_list() {
        let mut record = FreezeRecord::default();
        record.insert(d("2025-03-05"));
        record.insert(d("2025-02-01"));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, "[\"2025-02-01\",\"2025-03-05\"]");
    }
}
