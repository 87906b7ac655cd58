//! Ingestion pipeline stages
//!
//! Leaves first: classifier, validator, parser, resolver. The orchestrator
//! is the only stage that knows about the others.

pub mod code_resolver;
pub mod csv_validator;
pub mod ingestion_orchestrator;
pub mod row_parser;
pub mod status_classifier;

pub use ingestion_orchestrator::{
    eligible_entries, Collaborators, IngestionOrchestrator, OrchestratorSettings,
};
pub use status_classifier::classify;
