use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{admission_middleware, metrics_middleware};
use super::{handlers, jobs, uploads};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Operational endpoints are not subject to admission control
    let ops_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics));

    // Business endpoints pass through the token bucket first
    let guarded_routes = Router::new()
        // Uploads
        .route("/uploads", post(uploads::init_upload))
        .route("/uploads/{id}", get(uploads::get_progress))
        .route("/uploads/{id}", delete(uploads::cancel_upload))
        .route("/uploads/{id}/chunks/{index}", put(uploads::put_chunk))
        .route("/uploads/{id}/complete", post(uploads::complete_upload))
        // Jobs
        .route("/jobs", post(jobs::create_job))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}", delete(jobs::cancel_job))
        .route("/jobs/{id}/result", get(jobs::get_result))
        .route("/jobs/{id}/restart", post(jobs::restart_job))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ));

    let api_routes = ops_routes
        .merge(guarded_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
