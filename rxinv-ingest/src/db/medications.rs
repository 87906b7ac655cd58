//! Medication name lookup

use async_trait::async_trait;
use sqlx::SqlitePool;
use rxinv_common::Result;

/// Maps product names to canonical medication codes
#[async_trait]
pub trait MedicationCatalog: Send + Sync {
    /// Exact-name lookup; `None` when the name is unknown
    async fn find_code_by_name(&self, name: &str) -> Result<Option<String>>;
}

/// `medication_names` table backed catalog
#[derive(Clone)]
pub struct SqliteMedicationCatalog {
    pool: SqlitePool,
}

impl SqliteMedicationCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MedicationCatalog for SqliteMedicationCatalog {
    async fn find_code_by_name(&self, name: &str) -> Result<Option<String>> {
        let code: Option<String> = sqlx::query_scalar(
            "SELECT medicine_code FROM medication_names WHERE medicine_name = ? LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }
}

/// Insert or replace a name → code mapping
pub async fn upsert_medication(pool: &SqlitePool, name: &str, code: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO medication_names (medicine_name, medicine_code)
        VALUES (?, ?)
        ON CONFLICT(medicine_name) DO UPDATE SET medicine_code = excluded.medicine_code
        "#,
    )
    .bind(name)
    .bind(code)
    .execute(pool)
    .await?;

    Ok(())
}
