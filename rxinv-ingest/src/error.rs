//! Error types for rxinv-ingest
//!
//! `IngestError` is the per-file failure taxonomy. Every pipeline stage
//! returns `Result<T, IngestError>` and the orchestrator decides what each
//! kind means for the control ledger and the object's final location.
//! `ApiError` is the HTTP status surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Maximum stored length of a ledger failure reason (characters)
pub const MAX_REASON_CHARS: usize = 1000;

/// Per-file ingestion error
#[derive(Debug, Error)]
pub enum IngestError {
    /// Path or file name does not follow the inbox conventions
    #[error("Invalid blob path '{path}': {reason}")]
    PathPattern { path: String, reason: String },

    /// Malformed CSV structure (first violation only)
    #[error("{0}")]
    Validation(String),

    /// File contents disagree with the tenant or period encoded in its location
    #[error("{0}")]
    Consistency(String),

    /// One or more product names have no canonical code
    #[error("Medication(s) not found in reference table: {}", .missing.join(", "))]
    Resolution { missing: Vec<String> },

    /// Tenant absent from the registry (the id is kept for logs, not the reason)
    #[error("tenant not found")]
    TenantNotFound(String),

    /// Move target already exists (benign, reclassified by the orchestrator)
    #[error("Target blob already exists: {0}")]
    DestinationConflict(String),

    /// Object store or database failure
    #[error("{0}")]
    Infrastructure(String),
}

impl IngestError {
    pub fn path_pattern(path: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::PathPattern {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable code used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::PathPattern { .. } => "PATH_PATTERN",
            IngestError::Validation(_) => "VALIDATION",
            IngestError::Consistency(_) => "CONSISTENCY",
            IngestError::Resolution { .. } => "RESOLUTION",
            IngestError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            IngestError::DestinationConflict(_) => "DESTINATION_CONFLICT",
            IngestError::Infrastructure(_) => "INFRASTRUCTURE",
        }
    }

    /// Failure reason as stored in the control ledger
    pub fn ledger_reason(&self) -> String {
        truncate_reason(&self.to_string())
    }
}

impl From<rxinv_common::Error> for IngestError {
    fn from(err: rxinv_common::Error) -> Self {
        IngestError::Infrastructure(err.to_string())
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Infrastructure(format!("Database error: {}", err))
    }
}

/// Clamp a failure reason to the ledger column limit
///
/// Cuts on a char boundary; an empty reason becomes "Unknown error".
pub fn truncate_reason(reason: &str) -> String {
    if reason.trim().is_empty() {
        return "Unknown error".to_string();
    }
    reason.chars().take(MAX_REASON_CHARS).collect()
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_reason_limits_length() {
        let long = "x".repeat(1500);
        assert_eq!(truncate_reason(&long).chars().count(), MAX_REASON_CHARS);
    }

    #[test]
    fn test_truncate_reason_respects_char_boundaries() {
        let long = "ç".repeat(1200);
        let reason = truncate_reason(&long);
        assert_eq!(reason.chars().count(), MAX_REASON_CHARS);
        assert!(reason.chars().all(|c| c == 'ç'));
    }

    #[test]
    fn test_truncate_reason_empty_defaults() {
        assert_eq!(truncate_reason(""), "Unknown error");
        assert_eq!(truncate_reason("  "), "Unknown error");
    }

    #[test]
    fn test_short_reason_unchanged() {
        assert_eq!(truncate_reason("tenant not found"), "tenant not found");
    }

    #[test]
    fn test_resolution_message_lists_all_names() {
        let err = IngestError::Resolution {
            missing: vec!["A".into(), "B".into(), "C".into()],
        };
        assert_eq!(
            err.to_string(),
            "Medication(s) not found in reference table: A, B, C"
        );
        assert_eq!(err.kind(), "RESOLUTION");
    }

    #[test]
    fn test_tenant_not_found_reason() {
        let err = IngestError::TenantNotFound("12345678000199".into());
        assert_eq!(err.ledger_reason(), "tenant not found");
    }

    #[test]
    fn test_common_error_maps_to_infrastructure() {
        let err: IngestError = rxinv_common::Error::Internal("boom".into()).into();
        assert_eq!(err.kind(), "INFRASTRUCTURE");
    }
}
