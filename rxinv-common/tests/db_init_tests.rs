//! Integration tests for database initialization
//!
//! Covers automatic creation, idempotent re-open and the constraints the
//! ingestion ledger relies on.

use rxinv_common::db::init::{create_schema, init_database, init_memory_database};
use tempfile::TempDir;

fn file_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("rxinv.db").display())
}

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rxinv.db");
    assert!(!db_path.exists());

    let result = init_database(&file_url(&temp_dir), 3).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let url = file_url(&temp_dir);

    let pool1 = init_database(&url, 3).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&url, 3).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_schema_creates_all_tables() {
    let pool = init_memory_database().await.unwrap();

    let tables = table_names(&pool).await;
    for expected in [
        "file_ingestion_control",
        "medication_names",
        "pharmacies",
        "pharmacy_stock",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_schema_is_idempotent() {
    let pool = init_memory_database().await.unwrap();
    create_schema(&pool).await.unwrap();
    create_schema(&pool).await.unwrap();
}

#[tokio::test]
async fn test_control_ledger_rejects_duplicate_key() {
    let pool = init_memory_database().await.unwrap();

    let insert = r#"
        INSERT INTO file_ingestion_control
            (blob_path, version_tag, file_name, cnpj, reference_date, status, received_at)
        VALUES ('inbox/1/a.csv', 'v1', 'a.csv', '1', '2024-05-01', 'PROCESSING', '2024-05-01T00:00:00Z')
    "#;

    sqlx::query(insert).execute(&pool).await.unwrap();
    let second = sqlx::query(insert).execute(&pool).await;
    assert!(second.is_err(), "(blob_path, version_tag) must be unique");
}

#[tokio::test]
async fn test_control_ledger_rejects_unknown_status() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO file_ingestion_control
            (blob_path, version_tag, file_name, cnpj, reference_date, status, received_at)
        VALUES ('inbox/1/a.csv', 'v1', 'a.csv', '1', '2024-05-01', 'DONE', '2024-05-01T00:00:00Z')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_stock_rejects_negative_quantity() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO pharmacy_stock (cnpj, medicine_code, quantity, stock_status, updated_at)
        VALUES ('12345678000199', 'MED-1', -1, 'CRITICAL', '2024-05-01T00:00:00Z')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
