//! Upload API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use modkiln_core::{ChunkReceipt, SessionInfo, UploadProgress};

use crate::metrics::CHUNKS_RECEIVED_TOTAL;
use crate::state::AppState;

use super::{error_response, upload_error_response, ErrorBody};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating an upload session
#[derive(Debug, Deserialize)]
pub struct InitUploadBody {
    /// Number of chunks the client will send
    pub total_chunks: u32,
}

/// Response for a completed upload
#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub artifact_id: String,
    pub size_bytes: u64,
    pub sha256: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new upload session
pub async fn init_upload(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InitUploadBody>,
) -> Result<(StatusCode, Json<SessionInfo>), (StatusCode, Json<ErrorBody>)> {
    match state.uploads().init_session(body.total_chunks) {
        Ok(session) => Ok((StatusCode::CREATED, Json(session))),
        Err(e) => Err(upload_error_response(e)),
    }
}

/// Store one chunk
pub async fn put_chunk(
    State(state): State<Arc<AppState>>,
    Path((session_id, index)): Path<(String, u32)>,
    payload: bytes::Bytes,
) -> Result<Json<ChunkReceipt>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id)?;

    match state.uploads().put_chunk(&session_id, index, payload) {
        Ok(receipt) => {
            if receipt.status != modkiln_core::ChunkDisposition::Duplicate {
                CHUNKS_RECEIVED_TOTAL.inc();
            }
            Ok(Json(receipt))
        }
        Err(e) => Err(upload_error_response(e)),
    }
}

/// Report upload progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<UploadProgress>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id)?;

    match state.uploads().progress(&session_id) {
        Ok(progress) => Ok(Json(progress)),
        Err(e) => Err(upload_error_response(e)),
    }
}

/// Materialize the assembled artifact
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, Json<CompleteResponse>), (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id)?;

    match state.uploads().complete(&session_id) {
        Ok(artifact) => Ok((
            StatusCode::CREATED,
            Json(CompleteResponse {
                artifact_id: artifact.artifact_id,
                size_bytes: artifact.size_bytes,
                sha256: artifact.sha256,
            }),
        )),
        Err(e) => Err(upload_error_response(e)),
    }
}

/// Release a session; idempotent
pub async fn cancel_upload(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id)?;

    match state.uploads().cancel(&session_id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(upload_error_response(e)),
    }
}

fn validate_session_id(session_id: &str) -> Result<(), (StatusCode, Json<ErrorBody>)> {
    if uuid::Uuid::parse_str(session_id).is_err() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid session id: {}", session_id),
        ));
    }
    Ok(())
}
