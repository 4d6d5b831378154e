//! Remote data gateway.
//!
//! Request/response boundary to the hosted backend. The engine only ever
//! talks to the `RemoteGateway` trait; hosts wire in the REST client and
//! tests wire in `MemoryGateway`.

pub mod memory;
pub mod rest;

pub use memory::MemoryGateway;
pub use rest::RestGateway;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{ActivityLogEntry, DailyCheck, DailyLog, DateKey, RoutineItem};

/// Typed failure surface of every gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Could not reach the backend at all (DNS, connect, TLS).
    #[error("network unreachable: {0}")]
    Network(String),

    /// The request did not complete within the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Credentials missing, expired, or rejected.
    #[error("authentication rejected")]
    Auth,

    /// The backend answered with a non-success status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl GatewayError {
    /// Whether retrying later could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Auth => false,
            Self::Server { status, .. } => *status >= 500,
        }
    }
}

/// Reads and writes against the remote store.
///
/// Implementations carry their own user identity; callers never pass one.
/// Writes must be idempotent: every entity carries a client-generated id (or
/// natural key), and re-delivering a mutation must not create a duplicate.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn read_routine_items(&self) -> Result<Vec<RoutineItem>, GatewayError>;

    /// All checks with `start <= date <= end`.
    async fn read_checks(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyCheck>, GatewayError>;

    async fn read_daily_log(&self, date: DateKey) -> Result<Option<DailyLog>, GatewayError>;

    /// All daily logs in the range, for classifying many days in one call.
    async fn read_daily_logs(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyLog>, GatewayError>;

    async fn upsert_check(&self, check: &DailyCheck) -> Result<(), GatewayError>;

    async fn upsert_daily_log(&self, log: &DailyLog) -> Result<(), GatewayError>;

    async fn insert_activity_log(&self, entry: &ActivityLogEntry) -> Result<(), GatewayError>;

    async fn delete_activity_log(&self, id: Uuid) -> Result<(), GatewayError>;
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_by_class() {
        assert!(GatewayError::Network("dns".into()).is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(!GatewayError::Auth.is_retryable());
        assert!(GatewayError::Server { status: 503, message: String::new() }.is_retryable());
        assert!(!GatewayError::Server { status: 422, message: String::new() }.is_retryable());
    }
}
