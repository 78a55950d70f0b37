//! Result aggregation.
//!
//! Collapses per-stage outcomes into one final report and persists it
//! append-only, atomically with the job's terminal transition.

mod aggregator;
mod types;

pub use aggregator::ResultAggregator;
pub use types::{ConversionReport, ConversionResultRecord, FallbackNote, PackageSummary};

use thiserror::Error;

/// Errors from result aggregation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Unknown job id.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Finalization requested for a job outside the final pipeline state.
    #[error("job {job_id} cannot be finalized from state {status}")]
    InvalidState { job_id: String, status: String },

    /// Durable store failure.
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for ReportError {
    fn from(e: rusqlite::Error) -> Self {
        ReportError::Database(e.to_string())
    }
}
