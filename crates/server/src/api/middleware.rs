//! Admission control and metrics middleware for API routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    RATE_LIMITED_TOTAL,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

#[derive(Debug, Serialize)]
struct RateLimitedBody {
    error: String,
    retry_after_ms: u64,
}

/// Admission control middleware.
///
/// Applies the token bucket keyed by `(client, route template)` before the
/// business handler runs; denial answers 429 with a Retry-After hint.
pub async fn admission_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let client = client_identity(&request);
    let route = normalize_path(request.uri().path());

    match state.limiter().check(&client, &route).await {
        Ok(()) => Ok(next.run(request).await),
        Err(e) => {
            RATE_LIMITED_TOTAL.with_label_values(&[&route]).inc();

            let retry_after_ms = e.retry_after_ms();
            let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);

            let response = (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after_secs.to_string())],
                Json(RateLimitedBody {
                    error: e.to_string(),
                    retry_after_ms,
                }),
            )
                .into_response();
            Err(response)
        }
    }
}

/// Identify the caller for rate limiting.
///
/// Proxied deployments put the original client in X-Forwarded-For; otherwise
/// the socket peer address applies.
fn client_identity(request: &Request<Body>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "local".to_string())
}
