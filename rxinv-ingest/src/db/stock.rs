//! Stock sink (pharmacy_stock upserts)

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use rxinv_common::{Error, Result};

use super::to_db_timestamp;
use crate::models::ClassifiedStockEntry;
use crate::services::status_classifier::classify;
use crate::utils::begin_monitored;

/// Atomic batch writer for classified stock
#[async_trait]
pub trait StockSink: Send + Sync {
    /// Upsert every entry in one transaction; returns the number written
    async fn upsert_all(&self, entries: &[ClassifiedStockEntry]) -> Result<usize>;
}

#[derive(Clone)]
pub struct SqliteStockSink {
    pool: SqlitePool,
}

impl SqliteStockSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Reject entries that must never reach the table
fn check_entry(entry: &ClassifiedStockEntry) -> Result<()> {
    if entry.tenant_id.trim().is_empty() {
        return Err(Error::InvalidInput("stock entry without cnpj".to_string()));
    }
    if entry.product_code.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "stock entry without medicine_code (cnpj={})",
            entry.tenant_id
        )));
    }
    let expected = classify(entry.quantity);
    if entry.category != expected {
        return Err(Error::InvalidInput(format!(
            "stock_status {} does not match quantity {} (expected {}) for {}",
            entry.category, entry.quantity, expected, entry.product_code
        )));
    }
    Ok(())
}

#[async_trait]
impl StockSink for SqliteStockSink {
    async fn upsert_all(&self, entries: &[ClassifiedStockEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        entries.iter().try_for_each(check_entry)?;

        let updated_at = to_db_timestamp(Utc::now());
        let mut tx = begin_monitored(&self.pool, "stock_sink::upsert_all").await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO pharmacy_stock (cnpj, medicine_code, quantity, stock_status, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (cnpj, medicine_code) DO UPDATE SET
                    quantity = excluded.quantity,
                    stock_status = excluded.stock_status,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&entry.tenant_id)
            .bind(&entry.product_code)
            .bind(i64::from(entry.quantity))
            .bind(entry.category.as_str())
            .bind(&updated_at)
            .execute(&mut **tx.inner_mut()?)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(rows = entries.len(), "Stock batch committed");
        Ok(entries.len())
    }
}
