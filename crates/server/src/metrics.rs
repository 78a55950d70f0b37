//! Prometheus metrics for the HTTP surface.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "modkiln_http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap()
});

pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "modkiln_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path", "status"]
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "modkiln_http_requests_in_flight",
        "HTTP requests currently being handled"
    )
    .unwrap()
});

pub static RATE_LIMITED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "modkiln_rate_limited_total",
        "Requests rejected by admission control",
        &["route"]
    )
    .unwrap()
});

pub static JOBS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "modkiln_jobs_submitted_total",
        "Conversion jobs accepted for execution"
    )
    .unwrap()
});

pub static CHUNKS_RECEIVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "modkiln_upload_chunks_received_total",
        "Upload chunks accepted (duplicates excluded)"
    )
    .unwrap()
});

/// Collapse identifier path segments so metrics stay low-cardinality.
///
/// UUID-shaped segments become `{id}`, purely numeric segments become `{n}`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.is_empty() {
                segment
            } else if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else if segment.chars().all(|c| c.is_ascii_digit()) {
                "{n}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/uploads/6e3b1c9a-8f3e-4a3e-9a51-111111111111/chunks/3";
        assert_eq!(normalize_path(path), "/api/v1/uploads/{id}/chunks/{n}");
    }

    #[test]
    fn test_normalize_path_plain() {
        assert_eq!(normalize_path("/api/v1/jobs"), "/api/v1/jobs");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        let text = render();
        assert!(text.contains("modkiln_http_requests_in_flight"));
    }
}
