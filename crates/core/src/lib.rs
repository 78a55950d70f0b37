pub mod config;
pub mod executor;
pub mod job;
pub mod limiter;
pub mod pipeline;
pub mod reaper;
pub mod report;
pub mod storage;
pub mod testing;
pub mod upload;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig,
};
pub use executor::{
    ExecutorBackend, ExecutorConfig, ExecutorError, HttpExecutorConfig, HttpStageExecutor,
    JobContext, Stage, StageExecutor, StageOutput, StageResult,
};
pub use job::{
    AssumptionPolicy, ConversionJob, ConversionOptions, JobError, JobFilter, JobInput, JobProgress,
    JobStatus, JobStore, SqliteJobStore,
};
pub use limiter::{AdmissionController, AdmissionError, LimiterConfig, RouteLimit};
pub use pipeline::{CoordinatorStatus, PipelineConfig, PipelineCoordinator, PipelineError};
pub use reaper::{ExpiryReaper, ReaperConfig};
pub use report::{ConversionReport, ConversionResultRecord, ReportError, ResultAggregator};
pub use storage::Database;
pub use upload::{
    ArtifactRef, ChunkDisposition, ChunkReceipt, SessionInfo, UploadAssembler, UploadConfig,
    UploadError, UploadProgress,
};
