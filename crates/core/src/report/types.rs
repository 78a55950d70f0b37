//! Types for the report module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::executor::{JobContext, Stage};
use crate::pipeline::StageOutcome;

/// Final report produced for a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Fraction of stages that completed without the degraded path, in [0, 1].
    /// Degraded stages count in the denominator.
    pub success_rate: f64,

    /// Per-stage outcomes in execution order.
    pub stages: Vec<StageOutcome>,

    /// Every substitution applied across the pipeline, with explanations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_fallbacks: Vec<FallbackNote>,

    /// Errors recorded by degraded stages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Where the converted package landed, if the package stage reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageSummary>,
}

/// A recorded substitution ("smart assumption").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackNote {
    pub stage: Stage,
    pub explanation: String,
}

/// Summary of the produced package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub package_path: String,
    pub package_size_bytes: u64,
}

impl ConversionReport {
    /// Build the report from the recorded outcomes and the final context.
    pub fn from_outcomes(outcomes: &[StageOutcome], ctx: &JobContext) -> Self {
        let total = outcomes.len().max(1);
        let succeeded = outcomes.iter().filter(|o| !o.is_degraded()).count();

        let mut applied_fallbacks = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                StageOutcome::Succeeded {
                    stage,
                    applied_fallbacks: notes,
                    ..
                } => {
                    applied_fallbacks.extend(notes.iter().map(|note| FallbackNote {
                        stage: *stage,
                        explanation: note.clone(),
                    }));
                }
                StageOutcome::Degraded {
                    stage,
                    explanation,
                    errors: stage_errors,
                    ..
                } => {
                    applied_fallbacks.push(FallbackNote {
                        stage: *stage,
                        explanation: explanation.clone(),
                    });
                    errors.extend(stage_errors.iter().cloned());
                }
            }
        }

        let package = ctx.package.as_ref().map(|p| PackageSummary {
            package_path: p.package_path.clone(),
            package_size_bytes: p.package_size_bytes,
        });

        Self {
            success_rate: succeeded as f64 / total as f64,
            stages: outcomes.to_vec(),
            applied_fallbacks,
            errors,
            package,
        }
    }
}

/// A persisted result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResultRecord {
    pub id: String,
    pub job_id: String,
    pub output_data: ConversionReport,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PackageOutput;
    use crate::job::ConversionOptions;
    use crate::upload::ArtifactRef;
    use std::path::PathBuf;

    fn test_ctx() -> JobContext {
        JobContext::new(
            "job-1",
            ArtifactRef {
                artifact_id: "a-1".to_string(),
                path: PathBuf::from("/tmp/a.pkg"),
                size_bytes: 1,
                sha256: "00".to_string(),
            },
            ConversionOptions::new("2.0"),
        )
    }

    fn succeeded(stage: Stage) -> StageOutcome {
        StageOutcome::Succeeded {
            stage,
            attempts: 1,
            applied_fallbacks: vec![],
        }
    }

    #[test]
    fn test_all_stages_succeeded() {
        let outcomes: Vec<StageOutcome> = Stage::SEQUENCE.into_iter().map(succeeded).collect();
        let report = ConversionReport::from_outcomes(&outcomes, &test_ctx());

        assert_eq!(report.success_rate, 1.0);
        assert_eq!(report.stages.len(), 5);
        assert!(report.applied_fallbacks.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_degraded_stage_counts_in_denominator() {
        let mut outcomes: Vec<StageOutcome> = vec![
            succeeded(Stage::Analyze),
            succeeded(Stage::TranslateLogic),
            StageOutcome::Degraded {
                stage: Stage::ConvertAssets,
                attempts: 3,
                explanation: "assets carried over unconverted".to_string(),
                errors: vec!["codec unavailable".to_string()],
            },
            succeeded(Stage::Package),
            succeeded(Stage::Validate),
        ];
        let report = ConversionReport::from_outcomes(&outcomes, &test_ctx());

        assert_eq!(report.success_rate, 0.8);
        assert_eq!(report.applied_fallbacks.len(), 1);
        assert_eq!(report.applied_fallbacks[0].stage, Stage::ConvertAssets);
        assert_eq!(report.errors, vec!["codec unavailable".to_string()]);

        // Executor-reported fallbacks on a succeeded stage are collected too
        outcomes[0] = StageOutcome::Succeeded {
            stage: Stage::Analyze,
            attempts: 1,
            applied_fallbacks: vec!["manifest version guessed".to_string()],
        };
        let report = ConversionReport::from_outcomes(&outcomes, &test_ctx());
        assert_eq!(report.applied_fallbacks.len(), 2);
        assert_eq!(report.success_rate, 0.8);
    }

    #[test]
    fn test_package_summary_from_context() {
        let mut ctx = test_ctx();
        ctx.package = Some(PackageOutput {
            package_path: "/out/converted.pkg".to_string(),
            package_size_bytes: 4096,
            extra: serde_json::Map::new(),
        });

        let outcomes: Vec<StageOutcome> = Stage::SEQUENCE.into_iter().map(succeeded).collect();
        let report = ConversionReport::from_outcomes(&outcomes, &ctx);

        let package = report.package.unwrap();
        assert_eq!(package.package_path, "/out/converted.pkg");
        assert_eq!(package.package_size_bytes, 4096);
    }
}
