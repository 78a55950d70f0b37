//! Job API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use modkiln_core::{
    ConversionJob, ConversionOptions, ConversionResultRecord, JobFilter, JobInput, PipelineError,
};

use crate::metrics::JOBS_SUBMITTED_TOTAL;
use crate::state::AppState;

use super::{error_response, job_error_response, ErrorBody};

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    /// Artifact produced by a completed upload
    pub artifact_id: String,
    /// Conversion options
    pub options: ConversionOptions,
}

/// Response for job creation
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: String,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status tag
    pub status: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for a job status query
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: String,
    pub progress: u8,
    pub current_stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub cancel_requested: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Summary row in job listings
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ConversionJob> for JobSummary {
    fn from(job: ConversionJob) -> Self {
        Self {
            id: job.id,
            status: job.status.as_str().to_string(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new conversion job from a materialized artifact
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<CreateJobResponse>), (StatusCode, Json<ErrorBody>)> {
    let artifact = match state.uploads().artifact(&body.artifact_id) {
        Ok(Some(artifact)) => artifact,
        Ok(None) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("unknown artifact: {}", body.artifact_id),
            ));
        }
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    if body.options.target_version.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "options.target_version must not be empty",
        ));
    }

    let job = state
        .jobs()
        .create(JobInput {
            artifact,
            options: body.options,
        })
        .map_err(job_error_response)?;

    match state.coordinator().submit(&job.id).await {
        Ok(()) => {
            JOBS_SUBMITTED_TOTAL.inc();
            Ok((
                StatusCode::ACCEPTED,
                Json(CreateJobResponse {
                    job_id: job.id,
                    status: job.status.as_str().to_string(),
                }),
            ))
        }
        Err(PipelineError::NotRunning) => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "pipeline coordinator is not running",
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Get job status and progress
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, (StatusCode, Json<ErrorBody>)> {
    let job = match state.jobs().get(&id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("job not found: {}", id),
            ));
        }
        Err(e) => return Err(job_error_response(e)),
    };

    let progress = state.jobs().get_progress(&id).map_err(job_error_response)?;
    let (percent, current_stage) = progress
        .map(|p| (p.progress, p.current_stage))
        .unwrap_or((0, job.status.as_str().to_string()));

    Ok(Json(JobResponse {
        id: job.id,
        status: job.status.as_str().to_string(),
        progress: percent,
        current_stage,
        failure: job.failure,
        cancel_requested: job.cancel_requested,
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
    }))
}

/// List jobs with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, (StatusCode, Json<ErrorBody>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        filter = filter.with_status(status);
    }

    let jobs = state.jobs().list(&filter).map_err(job_error_response)?;
    let total = state.jobs().count(&filter).map_err(job_error_response)?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobSummary::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Fetch the finalized conversion result
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConversionResultRecord>, (StatusCode, Json<ErrorBody>)> {
    match state.aggregator().get_for_job(&id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("no result for job: {}", id),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Request job cancellation (observed at the next stage boundary)
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JobSummary>), (StatusCode, Json<ErrorBody>)> {
    let job = state.jobs().request_cancel(&id).map_err(job_error_response)?;
    Ok((StatusCode::ACCEPTED, Json(JobSummary::from(job))))
}

/// Restart a failed job from the beginning
pub async fn restart_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CreateJobResponse>), (StatusCode, Json<ErrorBody>)> {
    let job = state.jobs().restart(&id).map_err(job_error_response)?;

    match state.coordinator().submit(&job.id).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(CreateJobResponse {
                job_id: job.id,
                status: job.status.as_str().to_string(),
            }),
        )),
        Err(PipelineError::NotRunning) => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "pipeline coordinator is not running",
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}
