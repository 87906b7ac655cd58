//! Per-file ingestion context
//!
//! Derived once from the blob's location:
//! - path: `<inbox prefix><tenantId>/<fileName>`
//! - file name: `<segment>_<segment>_<yyyy-MM-dd>_<segment>.<ext>`

use chrono::NaiveDate;

use crate::error::IngestError;
use crate::models::BlobRef;

/// Position of the reference date among the file name's `_` segments
const DATE_SEGMENT: usize = 2;
const MIN_SEGMENTS: usize = 4;

/// Immutable description of the file being ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionContext {
    /// Full object name (ledger key, part 1)
    pub path: String,
    /// Content version (ledger key, part 2)
    pub version_tag: String,
    pub file_name: String,
    pub tenant_id: String,
    pub reference_date: NaiveDate,
}

impl IngestionContext {
    /// Derive the context from an inbox entry
    pub fn from_blob(blob: &BlobRef, inbox_prefix: &str) -> Result<Self, IngestError> {
        let path = blob.name.as_str();

        let relative = path
            .strip_prefix(inbox_prefix)
            .ok_or_else(|| IngestError::path_pattern(path, "not under the inbox prefix"))?;

        let (tenant_id, file_name) = match relative.split('/').collect::<Vec<_>>().as_slice() {
            [tenant, file] if !tenant.trim().is_empty() && !file.trim().is_empty() => {
                (tenant.to_string(), file.to_string())
            }
            _ => {
                return Err(IngestError::path_pattern(
                    path,
                    "expected <tenantId>/<fileName> below the inbox prefix",
                ))
            }
        };

        let reference_date = reference_date_from_file_name(&file_name)
            .ok_or_else(|| {
                IngestError::path_pattern(
                    path,
                    "file name must look like <a>_<b>_<yyyy-MM-dd>_<c>.csv",
                )
            })?;

        Ok(Self {
            path: path.to_string(),
            version_tag: blob.version_tag.clone(),
            file_name,
            tenant_id,
            reference_date,
        })
    }
}

/// Extract the reference date segment from a file name
pub fn reference_date_from_file_name(file_name: &str) -> Option<NaiveDate> {
    let stem = match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    };

    let segments: Vec<&str> = stem.split('_').collect();
    if segments.len() < MIN_SEGMENTS || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    parse_iso_date(segments[DATE_SEGMENT])
}

/// Strict `yyyy-MM-dd` parse
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
