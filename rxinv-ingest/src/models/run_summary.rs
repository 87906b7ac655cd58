//! Run-level result
//!
//! Counts only; individual failure reasons live in the control ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final classification of one inbox entry within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Processed,
    Failed,
    Duplicate,
}

/// Aggregate counts for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Entries older than the minimum age
    pub eligible: usize,
    pub processed: usize,
    pub failed: usize,
    pub duplicates: usize,
}

impl RunSummary {
    pub fn start(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            eligible: 0,
            processed: 0,
            failed: 0,
            duplicates: 0,
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Processed => self.processed += 1,
            FileOutcome::Failed => self.failed += 1,
            FileOutcome::Duplicate => self.duplicates += 1,
        }
    }

    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self
    }
}
