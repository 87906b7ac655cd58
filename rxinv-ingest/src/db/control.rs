//! Ingestion control ledger
//!
//! Persistent idempotency ledger keyed by (blob_path, version_tag). The four
//! operations `find`, `acquire`, `mark_processed` and `mark_failed` are the
//! whole fencing protocol:
//!
//! ```text
//!            acquire (insert-if-absent)
//!   (none) ─────────────────────────────▶ PROCESSING
//!                                          │       │
//!                           mark_processed │       │ mark_failed
//!                                          ▼       ▼
//!                                    PROCESSED   FAILED     (terminal)
//! ```
//!
//! Exclusivity of `acquire` comes from the UNIQUE (blob_path, version_tag)
//! constraint, not from application locking, so it holds across processes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use rxinv_common::{Error, Result};

use super::{from_db_timestamp, to_db_timestamp};
use crate::error::truncate_reason;
use crate::models::{ControlRecord, IngestStatus, IngestionContext};
use crate::utils::retry_on_lock;

/// Default bound for lock-contention retries
pub const DEFAULT_LOCK_WAIT_MS: u64 = 5000;

/// Idempotency ledger operations
#[async_trait]
pub trait IngestionLedger: Send + Sync {
    /// Record for (path, version_tag), if any
    async fn find(&self, path: &str, version_tag: &str) -> Result<Option<ControlRecord>>;

    /// Insert a PROCESSING record unless one exists; returns the new id only
    /// when this call created it
    async fn acquire(&self, ctx: &IngestionContext) -> Result<Option<i64>>;

    /// PROCESSING → PROCESSED
    async fn mark_processed(&self, id: i64) -> Result<()>;

    /// PROCESSING → FAILED with a reason (truncated to 1000 chars)
    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()>;

    /// PROCESSING records received before `received_before` (read-only)
    async fn find_stale(&self, received_before: DateTime<Utc>) -> Result<Vec<ControlRecord>>;
}

/// `file_ingestion_control` backed ledger
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    lock_wait_ms: u64,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_lock_wait(pool, DEFAULT_LOCK_WAIT_MS)
    }

    pub fn with_lock_wait(pool: SqlitePool, lock_wait_ms: u64) -> Self {
        Self { pool, lock_wait_ms }
    }

    async fn finish(&self, id: i64, status: IngestStatus, reason: Option<String>) -> Result<()> {
        let processed_at = to_db_timestamp(Utc::now());

        let rows_affected = retry_on_lock("ledger finish", self.lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                UPDATE file_ingestion_control
                SET status = ?, processed_at = ?, error_reason = ?
                WHERE id = ? AND status = 'PROCESSING'
                "#,
            )
            .bind(status.as_str())
            .bind(&processed_at)
            .bind(&reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if rows_affected == 0 {
            return Err(Error::NotFound(format!(
                "No PROCESSING ingestion record with id {}",
                id
            )));
        }

        tracing::debug!(lease_id = id, status = %status, "Ingestion record finalized");
        Ok(())
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, blob_path, version_tag, file_name, cnpj, reference_date,
           status, error_reason, received_at, processed_at
    FROM file_ingestion_control
"#;

fn record_from_row(row: &SqliteRow) -> Result<ControlRecord> {
    let status: String = row.get("status");
    let status = status.parse::<IngestStatus>().map_err(Error::Internal)?;

    let reference_date: String = row.get("reference_date");
    let reference_date = NaiveDate::parse_from_str(&reference_date, "%Y-%m-%d")
        .map_err(|e| Error::Internal(format!("Failed to parse reference_date: {}", e)))?;

    let received_at: String = row.get("received_at");
    let processed_at: Option<String> = row.get("processed_at");

    Ok(ControlRecord {
        id: row.get("id"),
        path: row.get("blob_path"),
        version_tag: row.get("version_tag"),
        file_name: row.get("file_name"),
        tenant_id: row.get("cnpj"),
        reference_date,
        status,
        error_reason: row.get("error_reason"),
        received_at: from_db_timestamp(&received_at)?,
        processed_at: processed_at.as_deref().map(from_db_timestamp).transpose()?,
    })
}

#[async_trait]
impl IngestionLedger for SqliteLedger {
    async fn find(&self, path: &str, version_tag: &str) -> Result<Option<ControlRecord>> {
        let sql = format!("{} WHERE blob_path = ? AND version_tag = ? LIMIT 1", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(path)
            .bind(version_tag)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn acquire(&self, ctx: &IngestionContext) -> Result<Option<i64>> {
        let received_at = to_db_timestamp(Utc::now());
        let reference_date = ctx.reference_date.format("%Y-%m-%d").to_string();

        retry_on_lock("ledger acquire", self.lock_wait_ms, || async {
            let id: Option<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO file_ingestion_control
                    (blob_path, version_tag, file_name, cnpj, reference_date, status, received_at)
                VALUES (?, ?, ?, ?, ?, 'PROCESSING', ?)
                ON CONFLICT (blob_path, version_tag) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&ctx.path)
            .bind(&ctx.version_tag)
            .bind(&ctx.file_name)
            .bind(&ctx.tenant_id)
            .bind(&reference_date)
            .bind(&received_at)
            .fetch_optional(&self.pool)
            .await?;
            Ok(id)
        })
        .await
    }

    async fn mark_processed(&self, id: i64) -> Result<()> {
        self.finish(id, IngestStatus::Processed, None).await
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        self.finish(id, IngestStatus::Failed, Some(truncate_reason(reason)))
            .await
    }

    async fn find_stale(&self, received_before: DateTime<Utc>) -> Result<Vec<ControlRecord>> {
        let sql = format!(
            "{} WHERE status = 'PROCESSING' AND received_at < ? ORDER BY received_at",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_db_timestamp(received_before))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(path: &str, version_tag: &str) -> IngestionContext {
        IngestionContext {
            path: path.to_string(),
            version_tag: version_tag.to_string(),
            file_name: "stock_daily_2024-05-01_001.csv".to_string(),
            tenant_id: "12345678000199".to_string(),
            reference_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    async fn ledger() -> SqliteLedger {
        SqliteLedger::new(rxinv_common::db::init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_acquire_creates_processing_record() {
        let ledger = ledger().await;
        let ctx = context("inbox/1/a.csv", "v1");

        let id = ledger.acquire(&ctx).await.unwrap().expect("lease");
        let record = ledger.find(&ctx.path, &ctx.version_tag).await.unwrap().unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.status, IngestStatus::Processing);
        assert_eq!(record.tenant_id, "12345678000199");
        assert_eq!(record.reference_date, ctx.reference_date);
        assert!(record.processed_at.is_none());
        assert!(record.error_reason.is_none());
    }

    #[tokio::test]
    async fn test_second_acquire_returns_none() {
        let ledger = ledger().await;
        let ctx = context("inbox/1/a.csv", "v1");

        assert!(ledger.acquire(&ctx).await.unwrap().is_some());
        assert!(ledger.acquire(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_version_gets_new_lease() {
        let ledger = ledger().await;

        let first = ledger.acquire(&context("inbox/1/a.csv", "v1")).await.unwrap();
        let second = ledger.acquire(&context("inbox/1/a.csv", "v2")).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let ledger = ledger().await;
        assert!(ledger.find("inbox/1/a.csv", "v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_processed_is_terminal() {
        let ledger = ledger().await;
        let ctx = context("inbox/1/a.csv", "v1");
        let id = ledger.acquire(&ctx).await.unwrap().unwrap();

        ledger.mark_processed(id).await.unwrap();
        let record = ledger.find(&ctx.path, &ctx.version_tag).await.unwrap().unwrap();
        assert_eq!(record.status, IngestStatus::Processed);
        assert!(record.processed_at.is_some());

        // Terminal: no further transitions
        assert!(ledger.mark_failed(id, "late failure").await.is_err());
        assert!(ledger.mark_processed(id).await.is_err());
        let record = ledger.find(&ctx.path, &ctx.version_tag).await.unwrap().unwrap();
        assert_eq!(record.status, IngestStatus::Processed);
        assert!(record.error_reason.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_truncates_reason() {
        let ledger = ledger().await;
        let ctx = context("inbox/1/a.csv", "v1");
        let id = ledger.acquire(&ctx).await.unwrap().unwrap();

        ledger.mark_failed(id, &"e".repeat(4000)).await.unwrap();
        let record = ledger.find(&ctx.path, &ctx.version_tag).await.unwrap().unwrap();

        assert_eq!(record.status, IngestStatus::Failed);
        assert_eq!(record.error_reason.unwrap().len(), 1000);
        assert!(ledger.mark_processed(id).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_failed_empty_reason_defaults() {
        let ledger = ledger().await;
        let ctx = context("inbox/1/a.csv", "v1");
        let id = ledger.acquire(&ctx).await.unwrap().unwrap();

        ledger.mark_failed(id, "").await.unwrap();
        let record = ledger.find(&ctx.path, &ctx.version_tag).await.unwrap().unwrap();
        assert_eq!(record.error_reason.as_deref(), Some("Unknown error"));
    }

    #[tokio::test]
    async fn test_mark_unknown_id_is_not_found() {
        let ledger = ledger().await;
        assert!(matches!(ledger.mark_processed(42).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_stale_lists_old_processing_only() {
        let ledger = ledger().await;
        let stuck = context("inbox/1/stuck.csv", "v1");
        let done = context("inbox/1/done.csv", "v1");

        ledger.acquire(&stuck).await.unwrap().unwrap();
        let done_id = ledger.acquire(&done).await.unwrap().unwrap();
        ledger.mark_processed(done_id).await.unwrap();

        let future = Utc::now() + chrono::Duration::minutes(1);
        let stale = ledger.find_stale(future).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].path, "inbox/1/stuck.csv");

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(ledger.find_stale(past).await.unwrap().is_empty());
    }
}
