//! Engine configuration.
//!
//! Loaded from `greenline.toml` (`[engine]` and `[remote]` sections); every
//! field has a default so a missing or partial file still yields a working
//! config.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::PlanTier;

const DEFAULT_HISTORY_DAYS: u32 = 365;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_DERIVED_TTL_SECS: u64 = 60;
const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MILESTONE_HORIZON: u32 = 30;
const DEFAULT_BASE_URL: &str = "https://sync.greenline.app";

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// Behavior knobs for the engine core (`[engine]` in greenline.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub plan_tier: PlanTier,
    /// ISO weekdays (1 = Monday … 7 = Sunday) excluded from streak
    /// evaluation entirely.
    pub rest_days: Vec<u8>,
    /// Days of history feeding streak and total-green computation. Caps the
    /// total-green count: milestones beyond this window stay out of reach
    /// until it is raised.
    pub history_days: u32,
    /// TTL for cached gateway reads, seconds.
    pub cache_ttl_secs: u64,
    /// TTL for derived views (day colors, streaks), seconds. Shorter, since
    /// they fold in more inputs.
    pub derived_ttl_secs: u64,
    /// Bounded window for a single network attempt, seconds.
    pub network_timeout_secs: u64,
    /// Hide milestone progress bars when more than this many units remain.
    pub milestone_horizon: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plan_tier: PlanTier::Free,
            rest_days: vec![],
            history_days: DEFAULT_HISTORY_DAYS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            derived_ttl_secs: DEFAULT_DERIVED_TTL_SECS,
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            milestone_horizon: DEFAULT_MILESTONE_HORIZON,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        for day in &self.rest_days {
            if !(1..=7).contains(day) {
                bail!("rest_days entries must be ISO weekdays 1-7, got {day}");
            }
        }
        if self.rest_days.len() >= 7 {
            bail!("every weekday is a rest day; streaks would never move");
        }
        if self.history_days == 0 {
            bail!("history_days must be at least 1");
        }
        Ok(())
    }
}

// ─── RemoteConfig ─────────────────────────────────────────────────────────────

/// Connection settings for the hosted backend (`[remote]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Bearer token for every gateway call.
    pub auth_token: String,
    pub user_id: String,
    /// Per-request timeout, seconds. 0 falls back to the built-in default.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: String::new(),
            user_id: String::new(),
            timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub remote: RemoteConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).context("invalid config file")?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
