//! Ingestion control ledger record

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger status
///
/// PROCESSING is the lease; PROCESSED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IngestStatus {
    Processing,
    Processed,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Processing => "PROCESSING",
            IngestStatus::Processed => "PROCESSED",
            IngestStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, IngestStatus::Processing)
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(IngestStatus::Processing),
            "PROCESSED" => Ok(IngestStatus::Processed),
            "FAILED" => Ok(IngestStatus::Failed),
            other => Err(format!("Unknown ingestion status: {}", other)),
        }
    }
}

/// One row of `file_ingestion_control`
///
/// At most one record exists per (path, version_tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRecord {
    pub id: i64,
    pub path: String,
    pub version_tag: String,
    pub file_name: String,
    pub tenant_id: String,
    pub reference_date: NaiveDate,
    pub status: IngestStatus,
    pub error_reason: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_processing_is_transient() {
        assert!(!IngestStatus::Processing.is_terminal());
        assert!(IngestStatus::Processed.is_terminal());
        assert!(IngestStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [IngestStatus::Processing, IngestStatus::Processed, IngestStatus::Failed] {
            assert_eq!(status.as_str().parse::<IngestStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<IngestStatus>().is_err());
    }
}
