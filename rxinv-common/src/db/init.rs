//! Database initialization
//!
//! Opens (creating when missing) the SQLite database used by the ingestion
//! service and bootstraps its tables. Every statement is idempotent, so this
//! runs on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize the connection pool and create tables if needed
///
/// `max_connections` is the fixed connection budget shared by the whole
/// process. In-memory URLs must use a single connection, since every
/// SQLite connection would otherwise see its own private database.
pub async fn init_database(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(250));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    info!(max_connections, "Database initialized: {}", database_url);
    Ok(pool)
}

/// Open a private in-memory database with the full schema (tests, demos)
pub async fn init_memory_database() -> Result<SqlitePool> {
    init_database("sqlite::memory:", 1).await
}

/// Create every table used by the ingestion pipeline
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_pharmacies_table(pool).await?;
    create_medication_names_table(pool).await?;
    create_pharmacy_stock_table(pool).await?;
    create_ingestion_control_table(pool).await?;
    Ok(())
}

/// Tenant registry: one row per pharmacy, keyed by its 14-digit CNPJ
pub async fn create_pharmacies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pharmacies (
            cnpj TEXT PRIMARY KEY,
            name TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Medication name to canonical code lookup
pub async fn create_medication_names_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS medication_names (
            medicine_name TEXT PRIMARY KEY,
            medicine_code TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Current stock per (pharmacy, medication); last write wins
pub async fn create_pharmacy_stock_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pharmacy_stock (
            cnpj TEXT NOT NULL,
            medicine_code TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            stock_status TEXT NOT NULL CHECK (stock_status IN ('CRITICAL', 'NORMAL', 'HIGH')),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (cnpj, medicine_code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Idempotency ledger
///
/// The UNIQUE (blob_path, version_tag) constraint is what makes lease
/// acquisition exclusive across concurrent runs.
pub async fn create_ingestion_control_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_ingestion_control (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            blob_path TEXT NOT NULL,
            version_tag TEXT NOT NULL,
            file_name TEXT NOT NULL,
            cnpj TEXT NOT NULL,
            reference_date TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('PROCESSING', 'PROCESSED', 'FAILED')),
            error_reason TEXT CHECK (error_reason IS NULL OR length(error_reason) <= 1000),
            received_at TEXT NOT NULL,
            processed_at TEXT,
            UNIQUE (blob_path, version_tag)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_ingestion_control_status
        ON file_ingestion_control (status, received_at)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
