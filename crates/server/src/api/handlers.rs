//! Health, config and metrics handlers.

use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;

use modkiln_core::SanitizedConfig;

use crate::metrics;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub coordinator_running: bool,
    pub active_jobs: usize,
}

/// Liveness probe with coordinator state
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.coordinator().status().await;
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        coordinator_running: status.running,
        active_jobs: status.active_jobs.len(),
    })
}

/// Sanitized configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus metrics in text format
pub async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
