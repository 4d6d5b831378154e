// SPDX-License-Identifier: MIT
//! Session-scoped read cache.
//!
//! TTL-keyed, in-memory only. Exists to avoid redundant gateway reads within
//! a session; it is never a source of truth and never survives a restart.
//!
//! Values are stored as JSON snapshots so one cache serves every read shape
//! (routine lists, day colors, daily logs) behind typed accessors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Cache key scheme shared by readers and invalidators.
///
/// Range reads embed their bounds, so invalidation drops the whole family by
/// prefix rather than guessing which ranges cover a changed date.
pub mod keys {
    use crate::model::DateKey;

    pub const ROUTINES: &str = "routines";
    pub const CHECKS_PREFIX: &str = "checks:";
    pub const DAYLOG_PREFIX: &str = "daylog:";
    pub const DAYLOGS_PREFIX: &str = "daylogs:";
    pub const DAYCOLOR_PREFIX: &str = "daycolor:";
    pub const DERIVED_PREFIX: &str = "derived:";

    pub fn checks(start: DateKey, end: DateKey) -> String {
        format!("{CHECKS_PREFIX}{start}:{end}")
    }

    pub fn daily_log(date: DateKey) -> String {
        format!("{DAYLOG_PREFIX}{date}")
    }

    pub fn daily_logs(start: DateKey, end: DateKey) -> String {
        format!("{DAYLOGS_PREFIX}{start}:{end}")
    }

    pub fn day_color(date: DateKey) -> String {
        format!("{DAYCOLOR_PREFIX}{date}")
    }

    /// Streak/milestone views derived from the full color history.
    pub fn derived(view: &str, today: DateKey) -> String {
        format!("{DERIVED_PREFIX}{view}:{today}")
    }
}

struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// In-memory TTL cache keyed by string.
///
/// Expired entries are purged lazily: a lookup that finds a stale entry
/// evicts it and reports a miss, so no stale read survives a single `get`.
pub struct ClientCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ClientCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key`, deserializing into `T`. Expired or undecodable entries
    /// are evicted and count as misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut guard = match self.entries.lock() {
            Ok(g) => g,
            // A poisoned cache is only ever a miss.
            Err(_) => return None,
        };
        let now = Instant::now();
        let snapshot = guard
            .get(key)
            .map(|e| (e.is_expired(now), e.value.clone()));

        let hit = match snapshot {
            None => None,
            Some((true, _)) => {
                guard.remove(key);
                None
            }
            Some((false, value)) => match serde_json::from_value(value) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(key = %key, error = %e, "evicting undecodable cache entry");
                    guard.remove(key);
                    None
                }
            },
        };
        drop(guard);

        match &hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    /// Store `value` under `key` with the cache's default TTL.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key` with an explicit TTL.
    pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "value not cacheable, skipping");
                return;
            }
        };
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(
                key.to_string(),
                CacheEntry {
                    value: json,
                    inserted_at: Instant::now(),
                    ttl,
                },
            );
        }
    }

    /// Drop entries. With a prefix, only keys starting with it are removed;
    /// without one, everything goes.
    pub fn clear(&self, prefix: Option<&str>) {
        if let Ok(mut guard) = self.entries.lock() {
            match prefix {
                Some(p) => guard.retain(|k, _| !k.starts_with(p)),
                None => guard.clear(),
            }
        }
    }

    /// Number of entries currently stored, expired ones included until a
    /// lookup purges them.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit rate 0.0–1.0 since construction. 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ClientCache {
        ClientCache::new(Duration::from_secs(300))
    }

    #[test]
    fn set_then_get_round_trips() {
        let c = cache();
        c.set("routines", &vec!["a".to_string(), "b".to_string()]);
        let got: Option<Vec<String>> = c.get("routines");
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn missing_key_is_a_miss() {
        let c = cache();
        let got: Option<u32> = c.get("nope");
        assert!(got.is_none());
        assert_eq!(c.hit_rate(), 0.0);
    }

    #[test]
    fn expired_entry_is_evicted_on_lookup() {
        let c = cache();
        c.set_with_ttl("k", &1u32, Duration::from_millis(20));
        assert_eq!(c.len(), 1);
        std::thread::sleep(Duration::from_millis(40));
        let got: Option<u32> = c.get("k");
        assert!(got.is_none());
        assert_eq!(c.len(), 0, "lookup purges the stale entry");
    }

    #[test]
    fn entry_within_ttl_is_served() {
        let c = cache();
        c.set_with_ttl("k", &7u32, Duration::from_secs(60));
        assert_eq!(c.get::<u32>("k"), Some(7));
    }

    #[test]
    fn clear_without_prefix_purges_everything() {
        let c = cache();
        c.set("a", &1u32);
        c.set("b", &2u32);
        c.clear(None);
        assert!(c.is_empty());
    }

    #[test]
    fn clear_with_prefix_is_selective() {
        let c = cache();
        c.set("daycolor:2025-03-01", &"green");
        c.set("daycolor:2025-03-02", &"red");
        c.set("routines", &vec!["a"]);
        c.clear(Some("daycolor:"));
        assert_eq!(c.len(), 1);
        assert!(c.get::<Vec<String>>("routines").is_some());
        assert!(c.get::<String>("daycolor:2025-03-01").is_none());
    }

    #[test]
    fn type_mismatch_evicts_and_misses() {
        let c = cache();
        c.set("k", &"a string");
        let got: Option<u32> = c.get("k");
        assert!(got.is_none());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn overwrite_refreshes_the_value() {
        let c = cache();
        c.set("k", &1u32);
        c.set("k", &2u32);
        assert_eq!(c.get::<u32>("k"), Some(2));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn hit_rate_tracks_lookups() {
        let c = cache();
        c.set("k", &1u32);
        let _: Option<u32> = c.get("k");
        let _: Option<u32> = c.get("absent");
        assert!((c.hit_rate() - 0.5).abs() < 1e-9);
    }
}
