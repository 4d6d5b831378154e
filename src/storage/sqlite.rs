//! SQLite-backed key-value store.
//!
//! One `kv_state` table, WAL journal so a force-quit mid-write never loses
//! the previous committed value.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use tracing::debug;

use super::{KeyValueStorage, StorageError};

/// Default timeout for individual SQLite queries.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Io(format!(
            "query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        ))),
    }
}

fn io_err(e: sqlx::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

/// Durable store rooted in a single SQLite file under `data_dir`.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn open(data_dir: &Path) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let db_path = data_dir.join("greenline.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))
                .map_err(io_err)?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await.map_err(io_err)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_state (
                 key        TEXT PRIMARY KEY,
                 value      BLOB NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .map_err(io_err)?;

        debug!(path = %db_path.display(), "kv store opened");
        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        with_timeout(async {
            let row: Option<(Vec<u8>,)> =
                sqlx::query_as("SELECT value FROM kv_state WHERE key = ?")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(io_err)?;
            Ok(row.map(|(v,)| v))
        })
        .await
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        with_timeout(async {
            sqlx::query(
                "INSERT INTO kv_state (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(bytes)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(io_err)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        with_timeout(async {
            sqlx::query("DELETE FROM kv_state WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(io_err)?;
            Ok(())
        })
        .await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
