//! Database Test Utilities

use anyhow::Result;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Ledger columns tests look at
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    pub id: i64,
    pub blob_path: String,
    pub version_tag: String,
    pub status: String,
    pub error_reason: Option<String>,
}

/// Create a file-backed test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test.
/// Unlike the in-memory pool this one has several connections, so
/// concurrent callers really race.
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_rxinv.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let pool = rxinv_common::db::init_database(&db_url, 4).await?;
    Ok((temp_dir, pool))
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let query = format!("SELECT COUNT(*) FROM {}", table);
    sqlx::query_scalar(&query).fetch_one(pool).await.unwrap()
}

/// Ledger records in insertion order
pub async fn ledger_rows(pool: &SqlitePool) -> Vec<LedgerRow> {
    sqlx::query_as(
        "SELECT id, blob_path, version_tag, status, error_reason FROM file_ingestion_control ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

/// (medicine_code, quantity, stock_status, updated_at) ordered by code
pub async fn stock_rows(pool: &SqlitePool) -> Vec<(String, i64, String, String)> {
    sqlx::query_as(
        "SELECT medicine_code, quantity, stock_status, updated_at FROM pharmacy_stock ORDER BY medicine_code",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}
