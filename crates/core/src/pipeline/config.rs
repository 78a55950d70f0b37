//! Pipeline coordinator configuration.

use serde::{Deserialize, Serialize};

use crate::executor::Stage;

/// Configuration for the pipeline coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Extra attempts after the first failure of a stage.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts (milliseconds).
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Per-attempt timeout around the opaque executor call (seconds).
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Stages that may be skipped with a recorded assumption instead of
    /// failing the job. Every other stage is required.
    #[serde(default = "default_best_effort_stages")]
    pub best_effort_stages: Vec<String>,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_stage_timeout() -> u64 {
    300
}

fn default_best_effort_stages() -> Vec<String> {
    vec![Stage::ConvertAssets.name().to_string()]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            stage_timeout_secs: default_stage_timeout(),
            best_effort_stages: default_best_effort_stages(),
        }
    }
}

impl PipelineConfig {
    /// Whether a stage may degrade instead of failing the job.
    pub fn is_best_effort(&self, stage: Stage) -> bool {
        self.best_effort_stages.iter().any(|s| s == stage.name())
    }

    /// Backoff before attempt `attempt` (1-based over the retries).
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        self.retry_base_delay_ms
            .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16))
    }
}
