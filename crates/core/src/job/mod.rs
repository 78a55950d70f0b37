//! Conversion job storage.
//!
//! The job store is the single source of truth for job lifecycle and
//! progress. State transitions follow the declared pipeline order and are
//! applied with update-if-unchanged writes, so a stage-skipping caller can
//! never corrupt the recorded lifecycle.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{
    AssumptionPolicy, ConversionJob, ConversionOptions, JobInput, JobProgress, JobStatus,
};
