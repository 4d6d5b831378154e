//! Greenline — local-first habit progress engine.
//!
//! Classifies days, walks streaks, meters freezes, and queues offline writes
//! so the host app never blocks on the network. Construct an [`Engine`] with
//! a gateway and a storage backend; everything else hangs off it.

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod freeze;
pub mod gateway;
pub mod milestones;
pub mod model;
pub mod queue;
pub mod storage;
pub mod streak;

// Re-export the surface hosts actually touch.
pub use cache::ClientCache;
pub use config::{Config, EngineConfig, RemoteConfig};
pub use engine::{Engine, ProgressView};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use freeze::{Allowance, FreezeOutcome};
pub use gateway::{GatewayError, MemoryGateway, RemoteGateway, RestGateway};
pub use model::{
    ActivityKey, ActivityLogEntry, DailyCheck, DailyLog, DateKey, DayColor, DayMode, PlanTier,
    RoutineItem, Section,
};
pub use queue::{Delivery, FlushOutcome};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
pub use streak::Streak;
