//! Device-local durable storage.
//!
//! A narrow key-value contract: the freeze ledger and the offline mutation
//! queue persist small JSON blobs that must survive force-quit and restart.
//! Hosts inject whichever implementation fits the platform; tests inject the
//! in-memory fake.

mod sqlite;

pub use sqlite::SqliteStorage;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying store failed to read or write.
    #[error("storage I/O failed: {0}")]
    Io(String),

    /// A persisted value no longer decodes. Raised by callers when a loaded
    /// blob fails to parse, not by the store itself.
    #[error("corrupt value under {key:?}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Durable key-value persistence surviving process restart.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Load the bytes under `key`. `None` when the key was never saved.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Save `bytes` under `key`, replacing any previous value.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ─── In-memory implementation ────────────────────────────────────────────────

/// Volatile store for tests and ephemeral hosts.
///
/// `fail_writes` turns every `save`/`remove` into an I/O error, for
/// exercising persistence-failure paths.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Overwrite a key directly, bypassing the failure switch. Lets tests
    /// plant corrupt blobs.
    pub fn put_raw(&self, key: &str, bytes: Vec<u8>) {
        self.entries
            .lock()
            .expect("memory storage poisoned")
            .insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| StorageError::Io("memory storage poisoned".into()))?
            .get(key)
            .cloned())
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("simulated write failure".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StorageError::Io("memory storage poisoned".into()))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("simulated write failure".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StorageError::Io("memory storage poisoned".into()))?
            .remove(key);
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_remove_cycle() {
        let store = MemoryStorage::new();
        assert_eq!(store.load("k").await.unwrap(), None);
        store.save("k", b"hello").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some(&b"hello"[..]));
        store.remove("k").await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_previous_value() {
        let store = MemoryStorage::new();
        store.save("k", b"one").await.unwrap();
        store.save("k", b"two").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn removing_absent_key_is_ok() {
        let store = MemoryStorage::new();
        assert!(store.remove("never-saved").await.is_ok());
    }

    #[tokio::test]
    async fn fail_writes_switch_blocks_mutation() {
        let store = MemoryStorage::new();
        store.save("k", b"v").await.unwrap();
        store.set_fail_writes(true);
        assert!(store.save("k", b"next").await.is_err());
        assert!(store.remove("k").await.is_err());
        // Reads keep working and see the old value.
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some(&b"v"[..]));
    }
}
