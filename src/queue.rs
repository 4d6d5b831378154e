// SPDX-License-Identifier: MIT
//! Offline mutation queue.
//!
//! Writes never block the user on connectivity. `enqueue_or_send` tries the
//! network once and otherwise parks the mutation in a durable FIFO that
//! `flush` drains opportunistically (reconnect, foreground, pull-to-refresh).
//!
//! Delivery is at-least-once: an entry leaves the queue only after the
//! gateway acknowledges it, so a crash between acknowledgment and the queue
//! snapshot re-delivers. Every mutation therefore targets an idempotent
//! remote write (client-generated id or natural key).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{keys, ClientCache};
use crate::gateway::{GatewayError, RemoteGateway};
use crate::model::{ActivityLogEntry, DailyCheck, DailyLog, DateKey};
use crate::storage::{KeyValueStorage, StorageError};

/// Storage key the pending queue persists under.
pub const QUEUE_KEY: &str = "queue/pending";

const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Mutations ────────────────────────────────────────────────────────────────

/// One user write, self-contained so it can be replayed after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationOp {
    UpsertCheck { check: DailyCheck },
    UpsertDailyLog { log: DailyLog },
    InsertActivityLog { entry: ActivityLogEntry },
    DeleteActivityLog { id: Uuid, date: DateKey },
}

impl MutationOp {
    /// The calendar day this write affects.
    pub fn date(&self) -> DateKey {
        match self {
            Self::UpsertCheck { check } => check.date,
            Self::UpsertDailyLog { log } => log.date,
            Self::InsertActivityLog { entry } => entry.date,
            Self::DeleteActivityLog { date, .. } => *date,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpsertCheck { .. } => "upsert_check",
            Self::UpsertDailyLog { .. } => "upsert_daily_log",
            Self::InsertActivityLog { .. } => "insert_activity_log",
            Self::DeleteActivityLog { .. } => "delete_activity_log",
        }
    }

    /// Identity of the logical record being written. Mutations sharing a
    /// record key must reach the backend in enqueue order.
    pub fn record_key(&self) -> String {
        match self {
            Self::UpsertCheck { check } => format!("check:{}:{}", check.item_id, check.date),
            Self::UpsertDailyLog { log } => format!("daylog:{}", log.date),
            Self::InsertActivityLog { entry } => format!("activity:{}", entry.id),
            Self::DeleteActivityLog { id, .. } => format!("activity:{id}"),
        }
    }
}

/// A mutation parked in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub id: Uuid,
    pub op: MutationOp,
    pub enqueued_at: DateTime<Utc>,
    /// Delivery attempts made from the queue.
    #[serde(default)]
    pub attempts: u32,
}

/// How `enqueue_or_send` disposed of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Acknowledged by the backend immediately.
    Sent,
    /// Parked durably for a later flush.
    Queued,
}

/// Tally of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

// ─── Queue ────────────────────────────────────────────────────────────────────

pub struct OfflineMutationQueue {
    gateway: Arc<dyn RemoteGateway>,
    storage: Arc<dyn KeyValueStorage>,
    cache: Arc<ClientCache>,
    pending: Mutex<VecDeque<QueuedMutation>>,
    /// No two flush passes run concurrently.
    flush_lock: tokio::sync::Mutex<()>,
    /// Bumped by every flush call; a running pass yields between entries once
    /// a newer call has superseded it.
    flush_generation: AtomicU64,
    /// Orders persisted snapshots: the snapshot is taken while holding this,
    /// so an older snapshot can never overwrite a newer one.
    save_lock: tokio::sync::Mutex<()>,
    network_timeout: Duration,
}

impl OfflineMutationQueue {
    /// Restore the queue from storage.
    ///
    /// A missing key is an empty queue; an undecodable blob surfaces as
    /// corruption rather than silently dropping pending writes.
    pub async fn load(
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn KeyValueStorage>,
        cache: Arc<ClientCache>,
        network_timeout: Option<Duration>,
    ) -> Result<Self, StorageError> {
        let pending: VecDeque<QueuedMutation> = match storage.load(QUEUE_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                key: QUEUE_KEY.to_string(),
                reason: e.to_string(),
            })?,
            None => VecDeque::new(),
        };
        if !pending.is_empty() {
            info!(pending = pending.len(), "offline queue restored");
        }
        Ok(Self {
            gateway,
            storage,
            cache,
            pending: Mutex::new(pending),
            flush_lock: tokio::sync::Mutex::new(()),
            flush_generation: AtomicU64::new(0),
            save_lock: tokio::sync::Mutex::new(()),
            network_timeout: network_timeout.unwrap_or(DEFAULT_NETWORK_TIMEOUT),
        })
    }

    /// Pending mutations, committed ones excluded.
    pub fn size(&self) -> usize {
        self.lock_pending().len()
    }

    /// Deliver `op` now if possible, otherwise park it durably.
    ///
    /// Gateway failures never propagate: the durable queue entry is the unit
    /// of durability and the caller gets `Queued`. Only a storage failure
    /// (the entry cannot be made durable) is an error.
    pub async fn enqueue_or_send(&self, op: MutationOp) -> Result<Delivery, StorageError> {
        // An immediate send would jump ahead of parked writes to the same
        // record; those must stay in enqueue order.
        let record_blocked = {
            let key = op.record_key();
            self.lock_pending().iter().any(|m| m.op.record_key() == key)
        };

        if !record_blocked {
            match self.deliver(&op).await {
                Ok(()) => {
                    debug!(kind = op.kind(), date = %op.date(), "delivered immediately");
                    self.invalidate(&op);
                    return Ok(Delivery::Sent);
                }
                Err(e) => {
                    info!(
                        kind = op.kind(),
                        retryable = e.is_retryable(),
                        error = %e,
                        "immediate send failed, queueing"
                    );
                }
            }
        }

        let mutation = QueuedMutation {
            id: Uuid::new_v4(),
            op,
            enqueued_at: Utc::now(),
            attempts: 0,
        };
        let id = mutation.id;
        self.lock_pending().push_back(mutation);
        if let Err(e) = self.persist().await {
            // Not durable — undo the park so the caller's error is truthful.
            self.lock_pending().retain(|m| m.id != id);
            return Err(e);
        }
        Ok(Delivery::Queued)
    }

    /// Drain the queue in FIFO order.
    ///
    /// An entry is removed only after the gateway acknowledges it. The first
    /// failure ends the pass: the failed entry must deliver before anything
    /// behind it, and a later flush will retry it. A flush issued while one
    /// is running supersedes it; the running pass completes its in-flight
    /// delivery, then yields.
    pub async fn flush(&self) -> FlushOutcome {
        let my_generation = self.flush_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.flush_lock.lock().await;
        let mut outcome = FlushOutcome::default();

        loop {
            if self.flush_generation.load(Ordering::SeqCst) != my_generation {
                debug!("flush superseded, yielding");
                break;
            }
            let Some(mutation) = self.lock_pending().front().cloned() else {
                break;
            };

            match self.deliver(&mutation.op).await {
                Ok(()) => {
                    self.lock_pending().retain(|m| m.id != mutation.id);
                    self.invalidate(&mutation.op);
                    outcome.succeeded += 1;
                    if let Err(e) = self.persist().await {
                        // Already acknowledged remotely; a stale snapshot only
                        // risks re-delivery, which the idempotent backend absorbs.
                        warn!(error = %e, "queue snapshot failed after delivery");
                    }
                }
                Err(e) => {
                    if let Some(front) = self.lock_pending().front_mut() {
                        if front.id == mutation.id {
                            front.attempts += 1;
                        }
                    }
                    outcome.failed += 1;
                    warn!(
                        kind = mutation.op.kind(),
                        attempts = mutation.attempts + 1,
                        retryable = e.is_retryable(),
                        error = %e,
                        "flush halted, entry retained"
                    );
                    if let Err(e) = self.persist().await {
                        warn!(error = %e, "queue snapshot failed after attempt");
                    }
                    break;
                }
            }
        }

        if outcome.succeeded > 0 {
            info!(
                delivered = outcome.succeeded,
                pending = self.size(),
                "flush complete"
            );
        }
        outcome
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    /// One network attempt, bounded by the configured window. A request that
    /// does not resolve in time counts as a failure and the entry is kept.
    async fn deliver(&self, op: &MutationOp) -> Result<(), GatewayError> {
        let call = async {
            match op {
                MutationOp::UpsertCheck { check } => self.gateway.upsert_check(check).await,
                MutationOp::UpsertDailyLog { log } => self.gateway.upsert_daily_log(log).await,
                MutationOp::InsertActivityLog { entry } => {
                    self.gateway.insert_activity_log(entry).await
                }
                MutationOp::DeleteActivityLog { id, .. } => {
                    self.gateway.delete_activity_log(*id).await
                }
            }
        };
        match tokio::time::timeout(self.network_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.network_timeout)),
        }
    }

    /// Drop cached reads the delivered write made stale. Activity entries are
    /// not cached, so activity ops have nothing to drop.
    fn invalidate(&self, op: &MutationOp) {
        match op {
            MutationOp::UpsertCheck { check } => {
                self.cache.clear(Some(keys::CHECKS_PREFIX));
                self.cache.clear(Some(&keys::day_color(check.date)));
                self.cache.clear(Some(keys::DERIVED_PREFIX));
            }
            MutationOp::UpsertDailyLog { log } => {
                self.cache.clear(Some(keys::DAYLOGS_PREFIX));
                self.cache.clear(Some(&keys::daily_log(log.date)));
                self.cache.clear(Some(&keys::day_color(log.date)));
                self.cache.clear(Some(keys::DERIVED_PREFIX));
            }
            MutationOp::InsertActivityLog { .. } | MutationOp::DeleteActivityLog { .. } => {}
        }
    }

    /// Snapshot the queue and write it through. Snapshots are taken under the
    /// save lock, so they reach storage in the order they were taken.
    async fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.save_lock.lock().await;
        let bytes = {
            let pending = self.lock_pending();
            serde_json::to_vec(&*pending).map_err(|e| StorageError::Corrupt {
                key: QUEUE_KEY.to_string(),
                reason: e.to_string(),
            })?
        };
        self.storage.save(QUEUE_KEY, &bytes).await
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedMutation>> {
        self.pending.lock().expect("mutation queue poisoned")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
