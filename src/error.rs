//! Engine-level error type.
//!
//! Validation failures are rejected synchronously, before anything reaches the
//! cache or the mutation queue. Gateway and storage failures are wrapped so
//! callers can match on the transport layer that failed.

use crate::gateway::GatewayError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Rejected configuration, caught at construction.
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),

    /// Date key is not a canonical `YYYY-MM-DD` string.
    #[error("invalid date key: {0:?}")]
    InvalidDateKey(String),

    /// Activity key is not in the known catalog.
    #[error("unknown activity key: {0:?}")]
    UnknownActivity(String),

    /// Activity value out of range for its key (negative, NaN, …).
    #[error("invalid value for {key}: {reason}")]
    InvalidActivityValue { key: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
