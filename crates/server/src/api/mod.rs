//! HTTP API surface.

mod handlers;
mod jobs;
mod middleware;
mod routes;
mod uploads;

pub use routes::create_router;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use modkiln_core::{JobError, UploadError};

/// JSON error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Map upload errors onto the wire contract.
///
/// An incomplete session maps to 404 on the completion route, matching the
/// external contract (unknown and incomplete are indistinguishable to a
/// client that lost track of the session).
pub(crate) fn upload_error_response(e: UploadError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        UploadError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
        UploadError::NotFound(_) => StatusCode::NOT_FOUND,
        UploadError::Incomplete { .. } => StatusCode::NOT_FOUND,
        UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

pub(crate) fn job_error_response(e: JobError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::InvalidTransition { .. } => StatusCode::CONFLICT,
        JobError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
        JobError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}
