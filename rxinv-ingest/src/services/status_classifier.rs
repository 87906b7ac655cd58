//! Stock level classification

use crate::models::{ClassifiedStockEntry, EnrichedStockRow, StockCategory};

/// Below this quantity stock is CRITICAL
pub const CRITICAL_BELOW: u32 = 10;
/// Above this quantity stock is HIGH
pub const HIGH_ABOVE: u32 = 30;

/// Map a quantity to its stock category
///
/// `< 10` CRITICAL, `10..=30` NORMAL, `> 30` HIGH.
pub fn classify(quantity: u32) -> StockCategory {
    if quantity < CRITICAL_BELOW {
        StockCategory::Critical
    } else if quantity <= HIGH_ABOVE {
        StockCategory::Normal
    } else {
        StockCategory::High
    }
}

/// Classify every enriched row, producing sink entries
pub fn classify_rows(rows: Vec<EnrichedStockRow>) -> Vec<ClassifiedStockEntry> {
    rows.into_iter()
        .map(|row| ClassifiedStockEntry {
            category: classify(row.quantity),
            tenant_id: row.tenant_id,
            product_code: row.product_code,
            quantity: row.quantity,
        })
        .collect()
}
