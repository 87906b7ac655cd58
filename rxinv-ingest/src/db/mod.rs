//! Database access for rxinv-ingest
//!
//! Each collaborator is a trait with a SQLite implementation so the
//! orchestrator receives its dependencies explicitly.

pub mod control;
pub mod medications;
pub mod pharmacies;
pub mod stock;

pub use control::{IngestionLedger, SqliteLedger};
pub use medications::{MedicationCatalog, SqliteMedicationCatalog};
pub use pharmacies::{SqliteTenantRegistry, TenantRegistry};
pub use stock::{SqliteStockSink, StockSink};

use chrono::{DateTime, SecondsFormat, Utc};
use rxinv_common::{Error, Result};

/// Stored timestamp format (UTC, fixed width, lexically ordered)
pub(crate) fn to_db_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}
