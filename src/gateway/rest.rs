//! REST gateway against the hosted sync backend.
//!
//! The backend exposes PostgREST-style row endpoints under `/rest/v1`.
//! Filters ride in the query string (`date=gte.2025-03-01`), upserts use a
//! `Prefer` header, and every request carries the user's bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{GatewayError, RemoteGateway};
use crate::config::RemoteConfig;
use crate::model::{ActivityLogEntry, DailyCheck, DailyLog, DateKey, RoutineItem};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    user_id: String,
    timeout: Duration,
}

impl RestGateway {
    pub fn new(config: &RemoteConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(if config.timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            config.timeout_secs
        });
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            user_id: config.user_id.clone(),
            timeout,
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn map_transport(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Network(e.to_string())
        }
    }

    /// Convert a non-success response into the typed error, reading the body
    /// for the server's message.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GatewayError::Auth);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(GatewayError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GatewayError> {
        let resp = self
            .client
            .get(self.endpoint(table))
            .bearer_auth(&self.auth_token)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let resp = Self::check(resp).await?;
        resp.json::<Vec<T>>()
            .await
            .map_err(|e| GatewayError::Network(format!("undecodable response: {e}")))
    }

    /// POST a row with upsert semantics on the table's natural key.
    async fn upsert_row<B: Serialize>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.endpoint(table))
            .bearer_auth(&self.auth_token)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        Self::check(resp).await?;
        debug!(table = table, "row upserted");
        Ok(())
    }
}

// ─── Wire rows ────────────────────────────────────────────────────────────────
// Write bodies add the owning user_id; reads deserialize straight into the
// domain types (serde ignores the extra column).

#[derive(Serialize)]
struct CheckRow<'a> {
    user_id: &'a str,
    item_id: &'a str,
    date: DateKey,
    done: bool,
}

#[derive(Serialize)]
struct DailyLogRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    log: &'a DailyLog,
}

#[derive(Serialize)]
struct ActivityRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    entry: &'a ActivityLogEntry,
}

#[async_trait]
impl RemoteGateway for RestGateway {
    async fn read_routine_items(&self) -> Result<Vec<RoutineItem>, GatewayError> {
        self.get_rows(
            "routine_items",
            &[
                ("user_id", format!("eq.{}", self.user_id)),
                ("order", "section.asc,label.asc".to_string()),
            ],
        )
        .await
    }

    async fn read_checks(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyCheck>, GatewayError> {
        self.get_rows(
            "daily_checks",
            &[
                ("user_id", format!("eq.{}", self.user_id)),
                ("date", format!("gte.{start}")),
                ("date", format!("lte.{end}")),
            ],
        )
        .await
    }

    async fn read_daily_log(&self, date: DateKey) -> Result<Option<DailyLog>, GatewayError> {
        let mut rows: Vec<DailyLog> = self
            .get_rows(
                "daily_logs",
                &[
                    ("user_id", format!("eq.{}", self.user_id)),
                    ("date", format!("eq.{date}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.pop())
    }

    async fn read_daily_logs(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<DailyLog>, GatewayError> {
        self.get_rows(
            "daily_logs",
            &[
                ("user_id", format!("eq.{}", self.user_id)),
                ("date", format!("gte.{start}")),
                ("date", format!("lte.{end}")),
            ],
        )
        .await
    }

    async fn upsert_check(&self, check: &DailyCheck) -> Result<(), GatewayError> {
        self.upsert_row(
            "daily_checks",
            "user_id,item_id,date",
            &CheckRow {
                user_id: &self.user_id,
                item_id: &check.item_id,
                date: check.date,
                done: check.done,
            },
        )
        .await
    }

    async fn upsert_daily_log(&self, log: &DailyLog) -> Result<(), GatewayError> {
        self.upsert_row(
            "daily_logs",
            "user_id,date",
            &DailyLogRow {
                user_id: &self.user_id,
                log,
            },
        )
        .await
    }

    async fn insert_activity_log(&self, entry: &ActivityLogEntry) -> Result<(), GatewayError> {
        // ignore-duplicates: a re-delivered insert with the same client id
        // must land on the existing row, not error or duplicate.
        let resp = self
            .client
            .post(self.endpoint("activity_logs"))
            .bearer_auth(&self.auth_token)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=ignore-duplicates")
            .json(&ActivityRow {
                user_id: &self.user_id,
                entry,
            })
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_activity_log(&self, id: Uuid) -> Result<(), GatewayError> {
        let resp = self
            .client
            .delete(self.endpoint("activity_logs"))
            .bearer_auth(&self.auth_token)
            .query(&[
                ("user_id", format!("eq.{}", self.user_id)),
                ("id", format!("eq.{id}")),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        // Deleting an already-deleted row matches filter zero rows — success.
        Self::check(resp).await?;
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
