//! Ingestion orchestrator
//!
//! Drives one run over the inbox:
//!
//! ```text
//! list → age filter → oldest first → for each entry:
//!   derive context → find → acquire lease → tenant check → download
//!   → validate → parse → resolve → classify → upsert
//!   → mark PROCESSED → move to processed/
//! ```
//!
//! Any failure after the lease short-circuits to mark FAILED → move to
//! error/. Entries are processed strictly one after another and one file's
//! failure never stops the loop.
//!
//! The object store and the database fail independently. The ledger record
//! is authoritative: when a file already has a terminal record, the run only
//! moves the object to where that status says it belongs (reconciliation)
//! and never re-executes the pipeline for it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::db::{IngestionLedger, MedicationCatalog, StockSink, TenantRegistry};
use crate::error::IngestError;
use crate::models::{BlobRef, ControlRecord, FileOutcome, IngestStatus, IngestionContext, RunSummary};
use crate::services::{code_resolver, csv_validator, row_parser, status_classifier};
use crate::storage::BlobInbox;
use rxinv_common::time;

/// Default minimum inbox age before a file is picked up
pub const DEFAULT_MIN_BLOB_AGE_MINUTES: i64 = 15;
/// Default age after which a PROCESSING lease is reported as stale
pub const DEFAULT_STALE_LEASE_MINUTES: i64 = 60;

/// Run tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Files younger than this may still be uploading
    pub min_blob_age_minutes: i64,
    pub stale_lease_minutes: i64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            min_blob_age_minutes: DEFAULT_MIN_BLOB_AGE_MINUTES,
            stale_lease_minutes: DEFAULT_STALE_LEASE_MINUTES,
        }
    }
}

/// Collaborators the orchestrator is built from
#[derive(Clone)]
pub struct Collaborators {
    pub inbox: BlobInbox,
    pub ledger: Arc<dyn IngestionLedger>,
    pub tenants: Arc<dyn TenantRegistry>,
    pub catalog: Arc<dyn MedicationCatalog>,
    pub sink: Arc<dyn StockSink>,
}

/// Ingestion run driver
pub struct IngestionOrchestrator {
    inbox: BlobInbox,
    ledger: Arc<dyn IngestionLedger>,
    tenants: Arc<dyn TenantRegistry>,
    catalog: Arc<dyn MedicationCatalog>,
    sink: Arc<dyn StockSink>,
    settings: OrchestratorSettings,
}

impl IngestionOrchestrator {
    pub fn new(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        let Collaborators {
            inbox,
            ledger,
            tenants,
            catalog,
            sink,
        } = collaborators;

        Self {
            inbox,
            ledger,
            tenants,
            catalog,
            sink,
            settings,
        }
    }

    /// Execute one run against the current time
    pub async fn run(&self) -> RunSummary {
        self.run_at(time::now()).await
    }

    /// Execute one run with an explicit "now" (age cutoff and stale check)
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingestion_run", run_id = %run_id);
        self.run_inner(run_id, now).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::start(run_id, time::now());

        self.report_stale_leases(now).await;

        let listed = match self.inbox.list_inbox().await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "Inbox listing failed, nothing processed");
                return self.finish(summary);
            }
        };

        let eligible = eligible_entries(listed, time::minutes_before(now, self.settings.min_blob_age_minutes));
        summary.eligible = eligible.len();
        tracing::info!(eligible = summary.eligible, "Run started");

        for blob in &eligible {
            let span = tracing::info_span!("ingest_file", blob = %blob.name, version_tag = %blob.version_tag);
            let outcome = self.process_entry(blob).instrument(span).await;
            summary.record(outcome);
        }

        self.finish(summary)
    }

    fn finish(&self, summary: RunSummary) -> RunSummary {
        let summary = summary.finish(time::now());
        tracing::info!(
            "Run finished: eligible={}, processed={}, failed={}, duplicates={}",
            summary.eligible,
            summary.processed,
            summary.failed,
            summary.duplicates
        );
        summary
    }

    /// PROCESSING leases older than the stale threshold are reported, never
    /// reclaimed. Resolving them is an operator decision.
    async fn report_stale_leases(&self, now: DateTime<Utc>) {
        let cutoff = time::minutes_before(now, self.settings.stale_lease_minutes);
        match self.ledger.find_stale(cutoff).await {
            Ok(stale) => {
                for record in stale {
                    tracing::warn!(
                        blob = %record.path,
                        version_tag = %record.version_tag,
                        lease_id = record.id,
                        received_at = %record.received_at,
                        "Stale PROCESSING lease (left untouched)"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "Stale lease check failed"),
        }
    }

    /// Full per-file state machine; never fails, only classifies
    pub async fn process_entry(&self, blob: &BlobRef) -> FileOutcome {
        let ctx = match IngestionContext::from_blob(blob, self.inbox.inbox_prefix()) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Rejected blob path");
                self.move_to_error_best_effort(&blob.name).await;
                return FileOutcome::Failed;
            }
        };

        match self.ledger.find(&ctx.path, &ctx.version_tag).await {
            Ok(Some(record)) => return self.reconcile(&ctx, &record).await,
            Ok(None) => {}
            Err(e) => {
                let e = IngestError::from(e);
                tracing::error!(kind = e.kind(), error = %e, "Ledger lookup failed");
                self.move_to_error_best_effort(&ctx.path).await;
                return FileOutcome::Failed;
            }
        }

        let lease_id = match self.ledger.acquire(&ctx).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::info!("Lease already taken by a concurrent run, skipping");
                return FileOutcome::Duplicate;
            }
            Err(e) => {
                let e = IngestError::from(e);
                tracing::error!(kind = e.kind(), error = %e, "Lease acquisition failed");
                self.move_to_error_best_effort(&ctx.path).await;
                return FileOutcome::Failed;
            }
        };

        tracing::debug!(lease_id, tenant = %ctx.tenant_id, "Lease acquired");

        match self.ingest(&ctx).await {
            Ok(rows) => self.complete(&ctx, lease_id, rows).await,
            Err(e) => self.fail(&ctx, lease_id, &e).await,
        }
    }

    /// Business pipeline under a held lease; returns rows written
    async fn ingest(&self, ctx: &IngestionContext) -> Result<usize, IngestError> {
        if !self.tenants.exists(&ctx.tenant_id).await? {
            return Err(IngestError::TenantNotFound(ctx.tenant_id.clone()));
        }

        let bytes = self.inbox.download(&ctx.path).await?;
        csv_validator::validate(&bytes, &ctx.path)?;
        let rows = row_parser::parse(&bytes, ctx)?;
        let enriched = code_resolver::resolve_codes(self.catalog.as_ref(), rows).await?;
        let entries = status_classifier::classify_rows(enriched);

        Ok(self.sink.upsert_all(&entries).await?)
    }

    async fn complete(&self, ctx: &IngestionContext, lease_id: i64, rows: usize) -> FileOutcome {
        if let Err(e) = self.ledger.mark_processed(lease_id).await {
            return self.fail(ctx, lease_id, &IngestError::from(e)).await;
        }

        match self.inbox.move_to_processed(&ctx.path).await {
            Ok(target) => {
                tracing::info!(lease_id, rows, target = %target, tenant = %ctx.tenant_id, "File ingested");
                FileOutcome::Processed
            }
            Err(IngestError::DestinationConflict(target)) => {
                tracing::info!(
                    lease_id,
                    target = %target,
                    "Processed target already exists, counting as duplicate"
                );
                FileOutcome::Duplicate
            }
            Err(e) => {
                // Ledger says PROCESSED; a later run moves the object
                tracing::warn!(lease_id, kind = e.kind(), error = %e, "File ingested but move failed");
                FileOutcome::Processed
            }
        }
    }

    async fn fail(&self, ctx: &IngestionContext, lease_id: i64, cause: &IngestError) -> FileOutcome {
        tracing::warn!(
            lease_id,
            tenant = %ctx.tenant_id,
            kind = cause.kind(),
            error = %cause,
            "File rejected"
        );

        if let Err(e) = self.ledger.mark_failed(lease_id, &cause.ledger_reason()).await {
            tracing::error!(lease_id, error = %e, "Could not record failure in ledger");
        }

        self.move_to_error_best_effort(&ctx.path).await;
        FileOutcome::Failed
    }

    /// Move an entry to where its terminal status says it belongs
    async fn reconcile(&self, ctx: &IngestionContext, record: &ControlRecord) -> FileOutcome {
        if !record.status.is_terminal() {
            tracing::info!(lease_id = record.id, "Lease in flight, leaving for a later run");
            return FileOutcome::Duplicate;
        }

        let moved = if record.status == IngestStatus::Processed {
            self.inbox.move_to_processed(&ctx.path).await
        } else {
            self.inbox.move_to_error(&ctx.path).await
        };

        match moved {
            Ok(target) => {
                tracing::info!(lease_id = record.id, status = %record.status, target = %target, "Reconciled duplicate");
            }
            Err(IngestError::DestinationConflict(target)) => {
                tracing::info!(lease_id = record.id, target = %target, "Duplicate already at destination");
            }
            Err(e) => {
                tracing::warn!(lease_id = record.id, kind = e.kind(), error = %e, "Reconciliation move failed");
            }
        }

        FileOutcome::Duplicate
    }

    async fn move_to_error_best_effort(&self, path: &str) {
        match self.inbox.move_to_error(path).await {
            Ok(target) => tracing::debug!(target = %target, "Moved to error area"),
            Err(IngestError::DestinationConflict(target)) => {
                tracing::info!(target = %target, "Error target already exists, source left in inbox")
            }
            Err(e) => tracing::warn!(kind = e.kind(), error = %e, "Move to error area failed"),
        }
    }
}

/// Entries strictly older than `cutoff`, oldest first (ties by name)
pub fn eligible_entries(mut listed: Vec<BlobRef>, cutoff: DateTime<Utc>) -> Vec<BlobRef> {
    listed.retain(|blob| blob.last_modified < cutoff);
    listed.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.name.cmp(&b.name))
    });
    listed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_eligible_entries_filters_and_sorts() {
        let now = Utc::now();
        let listed = vec![
            BlobRef::new("inbox/1/b.csv", "v", now - Duration::minutes(20)),
            BlobRef::new("inbox/1/young.csv", "v", now - Duration::minutes(5)),
            BlobRef::new("inbox/1/a.csv", "v", now - Duration::minutes(60)),
            BlobRef::new("inbox/1/c.csv", "v", now - Duration::minutes(16)),
        ];

        let eligible = eligible_entries(listed, now - Duration::minutes(15));
        let names: Vec<&str> = eligible.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["inbox/1/a.csv", "inbox/1/b.csv", "inbox/1/c.csv"]);
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let cutoff = Utc::now();
        let listed = vec![BlobRef::new("inbox/1/a.csv", "v", cutoff)];
        assert!(eligible_entries(listed, cutoff).is_empty());
    }

    #[test]
    fn test_default_settings() {
        let settings = OrchestratorSettings::default();
        assert_eq!(settings.min_blob_age_minutes, 15);
        assert_eq!(settings.stale_lease_minutes, 60);
    }
}
