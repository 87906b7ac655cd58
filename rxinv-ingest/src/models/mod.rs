//! Data models for rxinv-ingest
//!
//! Row types are ephemeral and scoped to one file; `ControlRecord` is the
//! only persistent state the pipeline owns.

pub mod blob;
pub mod context;
pub mod control;
pub mod run_summary;
pub mod stock;

pub use blob::BlobRef;
pub use context::IngestionContext;
pub use control::{ControlRecord, IngestStatus};
pub use run_summary::{FileOutcome, RunSummary};
pub use stock::{ClassifiedStockEntry, EnrichedStockRow, RawStockRow, StockCategory};
