//! rxinv-ingest library interface
//!
//! Idempotent ingestion of pharmacy inventory files from an object-store
//! inbox into the relational stock table. The binary wires these pieces;
//! integration tests use them directly.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, IngestError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::models::RunSummary;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Summary of the most recent finished run
    pub last_run: Arc<RwLock<Option<RunSummary>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            last_run: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
        }
    }

    /// Publish a finished run
    pub async fn record_run(&self, summary: RunSummary) {
        *self.last_run.write().await = Some(summary);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::run_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
