//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("rxinv-ingest")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git commit the binary was built from
    pub git_hash: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Completion time of the most recent run, if any
    pub last_run_at: Option<DateTime<Utc>>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_run_at = state
        .last_run
        .read()
        .await
        .as_ref()
        .and_then(|summary| summary.finished_at);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "rxinv-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("RXINV_GIT_HASH").to_string(),
        uptime_seconds,
        last_run_at,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
