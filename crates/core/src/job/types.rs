//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::upload::ArtifactRef;

/// Lifecycle state of a conversion job.
///
/// State machine flow:
/// ```text
/// Queued -> Analyzing -> Translating -> ConvertingAssets -> Packaging -> Validating -> Completed
///
/// Failed is reachable from any non-terminal state.
/// Completed and Failed are terminal.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Analyzing,
    Translating,
    ConvertingAssets,
    Packaging,
    Validating,
    Completed,
    Failed,
}

impl JobStatus {
    /// The declared successor along the pipeline order, if any.
    pub fn successor(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Queued => Some(JobStatus::Analyzing),
            JobStatus::Analyzing => Some(JobStatus::Translating),
            JobStatus::Translating => Some(JobStatus::ConvertingAssets),
            JobStatus::ConvertingAssets => Some(JobStatus::Packaging),
            JobStatus::Packaging => Some(JobStatus::Validating),
            JobStatus::Validating => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `next` is a legal transition from this state.
    ///
    /// `Failed` is always reachable from a non-terminal state; everything
    /// else must be the declared successor.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if next == JobStatus::Failed {
            return !self.is_terminal();
        }
        self.successor() == Some(next)
    }

    /// The state as a string tag (for storage and filtering).
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Translating => "translating",
            JobStatus::ConvertingAssets => "converting_assets",
            JobStatus::Packaging => "packaging",
            JobStatus::Validating => "validating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse a stored string tag back into a status.
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "analyzing" => Some(JobStatus::Analyzing),
            "translating" => Some(JobStatus::Translating),
            "converting_assets" => Some(JobStatus::ConvertingAssets),
            "packaging" => Some(JobStatus::Packaging),
            "validating" => Some(JobStatus::Validating),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How aggressively the pipeline may substitute assumptions for content it
/// cannot convert faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionPolicy {
    /// Prefer failing a stage over guessing.
    #[default]
    Conservative,
    /// Prefer recorded substitutions over failing the job.
    Aggressive,
}

/// Client-supplied conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Assumption policy for best-effort stages.
    #[serde(default)]
    pub assumptions: AssumptionPolicy,

    /// Target format version to convert into.
    pub target_version: String,

    /// Unknown options are preserved opaquely for forward compatibility;
    /// the coordinator never reads them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConversionOptions {
    pub fn new(target_version: impl Into<String>) -> Self {
        Self {
            assumptions: AssumptionPolicy::default(),
            target_version: target_version.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Input for creating a job.
#[derive(Debug, Clone)]
pub struct JobInput {
    /// The assembled artifact to convert.
    pub artifact: ArtifactRef,
    /// Conversion options.
    pub options: ConversionOptions,
}

/// A conversion job snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Unique identifier (UUID).
    pub id: String,

    /// Current lifecycle state.
    pub status: JobStatus,

    /// The artifact being converted.
    pub artifact: ArtifactRef,

    /// Conversion options.
    pub options: ConversionOptions,

    /// Set when a client asked for cancellation; observed by the coordinator
    /// at the next stage boundary.
    pub cancel_requested: bool,

    /// Failure reason when status is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Progress row, 1:1 with jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    /// 0-100, non-decreasing while the job is active.
    pub progress: u8,
    /// Tag of the stage the job is currently in.
    pub current_stage: String,
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_chain() {
        let mut status = JobStatus::Queued;
        let mut seen = vec![status];
        while let Some(next) = status.successor() {
            status = next;
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                JobStatus::Queued,
                JobStatus::Analyzing,
                JobStatus::Translating,
                JobStatus::ConvertingAssets,
                JobStatus::Packaging,
                JobStatus::Validating,
                JobStatus::Completed,
            ]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Validating.is_terminal());
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for status in [
            JobStatus::Queued,
            JobStatus::Analyzing,
            JobStatus::Translating,
            JobStatus::ConvertingAssets,
            JobStatus::Packaging,
            JobStatus::Validating,
        ] {
            assert!(status.can_transition_to(JobStatus::Failed), "{}", status);
        }
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_stage_skipping_is_illegal() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Packaging));
        assert!(!JobStatus::Analyzing.can_transition_to(JobStatus::ConvertingAssets));
        assert!(!JobStatus::Validating.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Validating.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Analyzing,
            JobStatus::Translating,
            JobStatus::ConvertingAssets,
            JobStatus::Packaging,
            JobStatus::Validating,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("unknown"), None);
    }

    #[test]
    fn test_options_preserve_unknown_fields() {
        let json = r#"{
            "assumptions": "aggressive",
            "target_version": "2.4",
            "texture_quality": "high"
        }"#;
        let options: ConversionOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.assumptions, AssumptionPolicy::Aggressive);
        assert_eq!(options.target_version, "2.4");
        assert_eq!(
            options.extra.get("texture_quality").and_then(|v| v.as_str()),
            Some("high")
        );

        // Round trip keeps the opaque field
        let back = serde_json::to_string(&options).unwrap();
        assert!(back.contains("texture_quality"));
    }
}
