//! Tenant registry (pharmacies)

use async_trait::async_trait;
use sqlx::SqlitePool;
use rxinv_common::Result;

/// Lookup of registered tenants
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn exists(&self, tenant_id: &str) -> Result<bool>;
}

/// `pharmacies` table backed registry
#[derive(Clone)]
pub struct SqliteTenantRegistry {
    pool: SqlitePool,
}

impl SqliteTenantRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRegistry for SqliteTenantRegistry {
    async fn exists(&self, tenant_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM pharmacies WHERE cnpj = ? LIMIT 1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }
}

/// Register a pharmacy (idempotent)
pub async fn register_pharmacy(pool: &SqlitePool, cnpj: &str, name: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO pharmacies (cnpj, name) VALUES (?, ?)")
        .bind(cnpj)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}
