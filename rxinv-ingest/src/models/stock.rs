//! Stock row types flowing through parse → resolve → classify → upsert

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stock level category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockCategory {
    Critical,
    Normal,
    High,
}

impl StockCategory {
    /// Stored representation (`stock_status` column)
    pub fn as_str(&self) -> &'static str {
        match self {
            StockCategory::Critical => "CRITICAL",
            StockCategory::Normal => "NORMAL",
            StockCategory::High => "HIGH",
        }
    }
}

impl fmt::Display for StockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRITICAL" => Ok(StockCategory::Critical),
            "NORMAL" => Ok(StockCategory::Normal),
            "HIGH" => Ok(StockCategory::High),
            other => Err(format!("Unknown stock category: {}", other)),
        }
    }
}

/// One parsed CSV data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStockRow {
    /// Digits-only CNPJ
    pub tenant_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub reference_date: NaiveDate,
}

/// Parsed row with its canonical medication code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedStockRow {
    pub tenant_id: String,
    pub product_name: String,
    pub product_code: String,
    pub quantity: u32,
    pub reference_date: NaiveDate,
}

impl EnrichedStockRow {
    pub fn from_raw(row: RawStockRow, product_code: String) -> Self {
        Self {
            tenant_id: row.tenant_id,
            product_name: row.product_name,
            product_code,
            quantity: row.quantity,
            reference_date: row.reference_date,
        }
    }
}

/// Row ready for the stock sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStockEntry {
    pub tenant_id: String,
    pub product_code: String,
    pub quantity: u32,
    pub category: StockCategory,
}
