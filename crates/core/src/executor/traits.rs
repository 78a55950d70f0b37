//! Trait definition for the stage execution boundary.

use async_trait::async_trait;

use super::error::ExecutorError;
use super::types::{JobContext, Stage, StageResult};

/// Executes one pipeline stage against a job context.
///
/// The call is opaque to the coordinator: cancellation is only observed
/// between calls, and a returned error is a failed attempt, never a crash.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Returns the name of this executor implementation.
    fn name(&self) -> &str;

    /// Run one stage. A `StageResult` with `success == false` and an `Err`
    /// are both failed attempts from the retry policy's point of view; the
    /// distinction is whether the executor itself answered.
    async fn run(&self, stage: Stage, ctx: &JobContext) -> Result<StageResult, ExecutorError>;
}
