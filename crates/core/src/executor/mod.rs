//! Stage execution boundary.
//!
//! The per-stage content transformation is an external collaborator behind
//! the [`StageExecutor`] trait; any implementation honoring the contract is
//! substitutable. The shipped backend forwards stages to a remote executor
//! service over HTTP.

mod config;
mod error;
mod http;
mod traits;
mod types;

pub use config::{ExecutorBackend, ExecutorConfig, HttpExecutorConfig};
pub use error::ExecutorError;
pub use http::HttpStageExecutor;
pub use traits::StageExecutor;
pub use types::{
    AnalysisOutput, AssetOutput, JobContext, PackageOutput, Stage, StageOutput, StageResult,
    TranslationOutput, ValidationOutput,
};
