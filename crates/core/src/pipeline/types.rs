//! Types for the pipeline module.

use serde::{Deserialize, Serialize};

use crate::executor::Stage;

/// How a single stage ended, as recorded in the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage produced its ideal output (possibly with executor-reported
    /// fallback substitutions).
    Succeeded {
        stage: Stage,
        /// Attempts it took, including the successful one.
        attempts: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        applied_fallbacks: Vec<String>,
    },
    /// A best-effort stage exhausted its retries and was skipped with a
    /// recorded assumption.
    Degraded {
        stage: Stage,
        attempts: u32,
        /// Human-readable explanation of the substitution.
        explanation: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
}

impl StageOutcome {
    pub fn stage(&self) -> Stage {
        match self {
            StageOutcome::Succeeded { stage, .. } => *stage,
            StageOutcome::Degraded { stage, .. } => *stage,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }
}

/// Snapshot of the coordinator for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    /// Whether the coordinator accepts submissions.
    pub running: bool,
    /// Jobs currently executing.
    pub active_jobs: Vec<String>,
    /// Jobs completed since startup.
    pub total_completed: u64,
    /// Jobs failed since startup (cancellations included).
    pub total_failed: u64,
    /// Jobs completed with at least one degraded stage.
    pub total_degraded: u64,
}
