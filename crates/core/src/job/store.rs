//! Job store trait and filtering.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{ConversionJob, JobInput, JobProgress, JobStatus};

/// Errors from job store operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Unknown job id.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Requested transition is not the declared successor of the current
    /// state (and is not `failed` from a non-terminal state).
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    /// Malformed input (progress out of range or decreasing).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Durable store failure.
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for JobError {
    fn from(e: rusqlite::Error) -> Self {
        JobError::Database(e.to_string())
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Filter by status tag (e.g. "queued").
    pub status: Option<String>,
    /// Maximum number of jobs to return.
    pub limit: i64,
    /// Pagination offset.
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Durable record of job identity, status and progress.
///
/// Implementations serialize concurrent access to the same job while allowing
/// full parallelism across different jobs.
pub trait JobStore: Send + Sync {
    /// Create a job in `Queued` with progress 0.
    fn create(&self, input: JobInput) -> Result<ConversionJob, JobError>;

    /// Fetch a job snapshot.
    fn get(&self, id: &str) -> Result<Option<ConversionJob>, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<ConversionJob>, JobError>;

    /// Count jobs matching the filter (ignoring pagination).
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Apply a state transition. Rejects anything that is not the declared
    /// successor of the current state, leaving the row unchanged.
    fn transition(&self, id: &str, next: JobStatus) -> Result<ConversionJob, JobError>;

    /// Transition into `Failed` from any non-terminal state, recording the
    /// reason in the same write.
    fn fail(&self, id: &str, reason: &str) -> Result<ConversionJob, JobError>;

    /// Update the progress row. Percent must stay within [0, 100] and may
    /// never decrease while the job is active.
    fn update_progress(&self, id: &str, percent: u8, stage: &str) -> Result<(), JobError>;

    /// Fetch the progress row.
    fn get_progress(&self, id: &str) -> Result<Option<JobProgress>, JobError>;

    /// Ask for cancellation; the coordinator observes the flag at the next
    /// stage boundary. Rejected on terminal jobs.
    fn request_cancel(&self, id: &str) -> Result<ConversionJob, JobError>;

    /// Put a failed job back into `Queued` and reset its progress.
    fn restart(&self, id: &str) -> Result<ConversionJob, JobError>;

    /// Non-terminal jobs that have not been touched since `cutoff` (input to
    /// the expiry reaper).
    fn list_stuck(&self, cutoff: DateTime<Utc>, limit: i64)
        -> Result<Vec<ConversionJob>, JobError>;
}
