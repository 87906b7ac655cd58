//! Run status endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::models::RunSummary;
use crate::AppState;

/// GET /runs/last
///
/// Counts of the most recent finished run; 404 until one has finished.
pub async fn last_run(State(state): State<AppState>) -> ApiResult<Json<RunSummary>> {
    state
        .last_run
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No ingestion run has finished yet".to_string()))
}

pub fn run_routes() -> Router<AppState> {
    Router::new().route("/runs/last", get(last_run))
}
