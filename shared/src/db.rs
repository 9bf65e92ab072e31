//! PostgreSQL-backed [`StatusStore`]. Each transition is one `UPDATE ... WHERE
//! status = ...`, so the row count is the ownership answer.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::config::SslMode;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use crate::config::Settings;
use crate::dto::{ClassificationStatus, Label, StatusRecord, StatusUpdate};
use crate::error::{AppError, Result};
use crate::status_store::{
    check_transition, RecoveryReport, StatusStore, INTERRUPTED_MESSAGE, ORPHANED_MESSAGE,
};

/// Parses the database URL. Connections are made with `NoTls`, so TLS is
/// switched off unless the URL asks for an `sslmode` itself.
pub fn pg_config(url: &str) -> Result<tokio_postgres::Config> {
    let mut config = tokio_postgres::Config::from_str(url)?;
    if !url.to_ascii_lowercase().contains("sslmode=") {
        config.ssl_mode(SslMode::Disable);
    }
    Ok(config)
}

/// Builds the connection pool from [`Settings::database_url`].
pub fn connect(settings: &Settings) -> Result<Pool> {
    let manager = Manager::from_config(
        pg_config(&settings.database_url)?,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(settings.pool_size)
        .build()
        .map_err(|e| AppError::Database(e.to_string()))
}

#[derive(Clone)]
pub struct PgStatusStore {
    pool: Pool,
}

impl PgStatusStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates the status table and its index (idempotent).
    pub async fn migrate(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS classification_status (
                    document_id INTEGER PRIMARY KEY,
                    status      TEXT NOT NULL DEFAULT 'queued'
                                CHECK (status IN ('queued','extracting','classifying','completed','failed')),
                    label       TEXT,
                    error       VARCHAR(500),
                    queued_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS idx_classification_status_status
                    ON classification_status (status);",
            )
            .await?;
        info!("classification_status table ready");
        Ok(())
    }
}

fn record_from_row(row: &Row) -> Result<StatusRecord> {
    let id: i32 = row.get("document_id");
    let status_text: String = row.get("status");
    let status = ClassificationStatus::from_str(&status_text).map_err(|e| {
        AppError::CorruptRecord {
            id,
            reason: e.to_string(),
        }
    })?;
    let label = match row.get::<_, Option<String>>("label") {
        Some(text) => Some(Label::from_str(&text).map_err(|_| AppError::CorruptRecord {
            id,
            reason: format!("unknown label '{text}'"),
        })?),
        None => None,
    };
    Ok(StatusRecord {
        id,
        status,
        label,
        error: row.get("error"),
        queued_at: row.get("queued_at"),
    })
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn create(&self, id: i32) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO classification_status (document_id) VALUES ($1)
                 ON CONFLICT (document_id) DO NOTHING",
                &[&id],
            )
            .await?;
        Ok(())
    }

    async fn claim(&self, id: i32) -> Result<bool> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE classification_status
                    SET status = 'extracting', queued_at = now(), label = NULL, error = NULL,
                        updated_at = now()
                  WHERE document_id = $1 AND status = 'queued'",
                &[&id],
            )
            .await?;
        debug!(doc_id = id, rows, "claim");
        Ok(rows == 1)
    }

    async fn set_status(
        &self,
        id: i32,
        expected: ClassificationStatus,
        update: StatusUpdate,
    ) -> Result<bool> {
        check_transition(id, expected, &update)?;
        let label = update.label().map(|l| l.to_string());
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE classification_status
                    SET status = $3, label = $4, error = $5, updated_at = now()
                  WHERE document_id = $1 AND status = $2",
                &[
                    &id,
                    &expected.as_str(),
                    &update.status().as_str(),
                    &label,
                    &update.error(),
                ],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn requeue(&self, id: i32) -> Result<bool> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE classification_status
                    SET status = 'queued', queued_at = now(), label = NULL, error = NULL,
                        updated_at = now()
                  WHERE document_id = $1 AND status = 'failed'",
                &[&id],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn get(&self, id: i32) -> Result<Option<StatusRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT document_id, status, label, error, queued_at
                   FROM classification_status
                  WHERE document_id = $1",
                &[&id],
            )
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn recover_stale(
        &self,
        active_cutoff: DateTime<Utc>,
        backlog_cutoff: DateTime<Utc>,
    ) -> Result<RecoveryReport> {
        let client = self.pool.get().await?;
        let interrupted = client
            .execute(
                "UPDATE classification_status
                    SET status = 'failed', label = NULL, error = $2, updated_at = now()
                  WHERE status IN ('extracting', 'classifying') AND queued_at < $1",
                &[&active_cutoff, &INTERRUPTED_MESSAGE],
            )
            .await?;
        let orphaned = client
            .execute(
                "UPDATE classification_status
                    SET status = 'failed', label = NULL, error = $2, updated_at = now()
                  WHERE status = 'queued' AND queued_at < $1",
                &[&backlog_cutoff, &ORPHANED_MESSAGE],
            )
            .await?;
        Ok(RecoveryReport {
            interrupted,
            orphaned,
        })
    }
}
