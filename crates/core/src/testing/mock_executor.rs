//! Mock stage executor for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::executor::{
    AnalysisOutput, AssetOutput, ExecutorError, JobContext, PackageOutput, Stage, StageExecutor,
    StageOutput, StageResult, TranslationOutput, ValidationOutput,
};

/// Scripted failure for one stage.
struct FailPlan {
    remaining: u32,
    message: String,
}

/// Mock implementation of the StageExecutor trait.
///
/// Provides controllable behavior for testing:
/// - Record invocations for assertions
/// - Fail a stage N times (or forever) before succeeding
/// - Replace the canned output for a stage
/// - Simulate slow stages
pub struct MockStageExecutor {
    calls: RwLock<Vec<Stage>>,
    fail_plans: RwLock<HashMap<Stage, FailPlan>>,
    custom_results: RwLock<HashMap<Stage, StageResult>>,
    transport_errors: RwLock<HashMap<Stage, u32>>,
    delay: RwLock<Duration>,
}

impl Default for MockStageExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStageExecutor {
    /// Create a new mock that succeeds every stage with canned output.
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(Vec::new()),
            fail_plans: RwLock::new(HashMap::new()),
            custom_results: RwLock::new(HashMap::new()),
            transport_errors: RwLock::new(HashMap::new()),
            delay: RwLock::new(Duration::ZERO),
        }
    }

    /// Fail `count` invocations of `stage` with the given message before
    /// succeeding again. Use `u32::MAX` to fail forever.
    pub async fn fail_stage(&self, stage: Stage, count: u32, message: impl Into<String>) {
        self.fail_plans.write().await.insert(
            stage,
            FailPlan {
                remaining: count,
                message: message.into(),
            },
        );
    }

    /// Make the next `count` invocations of `stage` return a transport error
    /// instead of an unsuccessful result.
    pub async fn error_stage(&self, stage: Stage, count: u32) {
        self.transport_errors.write().await.insert(stage, count);
    }

    /// Replace the canned success result for a stage.
    pub async fn set_result(&self, stage: Stage, result: StageResult) {
        self.custom_results.write().await.insert(stage, result);
    }

    /// Simulated duration of each stage invocation.
    pub async fn set_stage_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Total number of invocations across all stages.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Number of invocations for a particular stage.
    pub async fn calls_for(&self, stage: Stage) -> u32 {
        self.calls.read().await.iter().filter(|s| **s == stage).count() as u32
    }

    /// All recorded invocations in order.
    pub async fn recorded_calls(&self) -> Vec<Stage> {
        self.calls.read().await.clone()
    }

    fn default_output(stage: Stage, ctx: &JobContext) -> StageOutput {
        match stage {
            Stage::Analyze => StageOutput::Analysis(AnalysisOutput {
                mod_name: "example-mod".to_string(),
                source_format: "legacy".to_string(),
                detected_features: vec!["scripts".to_string(), "textures".to_string()],
                script_files: 4,
                asset_files: 10,
                extra: serde_json::Map::new(),
            }),
            Stage::TranslateLogic => StageOutput::Translation(TranslationOutput {
                translated_scripts: 4,
                skipped_scripts: 0,
                notes: vec![],
                extra: serde_json::Map::new(),
            }),
            Stage::ConvertAssets => StageOutput::Assets(AssetOutput {
                converted_assets: 10,
                skipped_assets: 0,
                extra: serde_json::Map::new(),
            }),
            Stage::Package => StageOutput::Package(PackageOutput {
                package_path: format!("/converted/{}.pkg", ctx.job_id),
                package_size_bytes: 2048,
                extra: serde_json::Map::new(),
            }),
            Stage::Validate => StageOutput::Validation(ValidationOutput {
                checks_passed: 12,
                checks_failed: 0,
                warnings: vec![],
                extra: serde_json::Map::new(),
            }),
        }
    }
}

#[async_trait]
impl StageExecutor for MockStageExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, stage: Stage, ctx: &JobContext) -> Result<StageResult, ExecutorError> {
        self.calls.write().await.push(stage);

        let delay = *self.delay.read().await;
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        {
            let mut transport = self.transport_errors.write().await;
            if let Some(remaining) = transport.get_mut(&stage) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ExecutorError::ConnectionFailed(
                        "mock transport error".to_string(),
                    ));
                }
            }
        }

        {
            let mut plans = self.fail_plans.write().await;
            if let Some(plan) = plans.get_mut(&stage) {
                if plan.remaining > 0 {
                    plan.remaining = plan.remaining.saturating_sub(1);
                    return Ok(StageResult {
                        success: false,
                        output: None,
                        applied_fallbacks: vec![],
                        errors: vec![plan.message.clone()],
                    });
                }
            }
        }

        if let Some(result) = self.custom_results.read().await.get(&stage) {
            return Ok(result.clone());
        }

        Ok(StageResult {
            success: true,
            output: Some(Self::default_output(stage, ctx)),
            applied_fallbacks: vec![],
            errors: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[tokio::test]
    async fn test_default_success() {
        let executor = MockStageExecutor::new();
        let result = executor.run(Stage::Analyze, &test_ctx()).await.unwrap();
        assert!(result.success);
        assert!(matches!(result.output, Some(StageOutput::Analysis(_))));
        assert_eq!(executor.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let executor = MockStageExecutor::new();
        executor.fail_stage(Stage::Package, 2, "boom").await;

        let ctx = test_ctx();
        for _ in 0..2 {
            let result = executor.run(Stage::Package, &ctx).await.unwrap();
            assert!(!result.success);
            assert_eq!(result.errors, vec!["boom".to_string()]);
        }

        let result = executor.run(Stage::Package, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(executor.calls_for(Stage::Package).await, 3);
    }

    #[tokio::test]
    async fn test_transport_errors() {
        let executor = MockStageExecutor::new();
        executor.error_stage(Stage::Validate, 1).await;

        let ctx = test_ctx();
        let err = executor.run(Stage::Validate, &ctx).await.unwrap_err();
        assert!(matches!(err, ExecutorError::ConnectionFailed(_)));

        let result = executor.run(Stage::Validate, &ctx).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_custom_result() {
        let executor = MockStageExecutor::new();
        executor
            .set_result(
                Stage::Analyze,
                StageResult {
                    success: true,
                    output: None,
                    applied_fallbacks: vec!["manifest version guessed".to_string()],
                    errors: vec![],
                },
            )
            .await;

        let result = executor.run(Stage::Analyze, &test_ctx()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.applied_fallbacks.len(), 1);
    }

    #[tokio::test]
    async fn test_recorded_calls_preserve_order() {
        let executor = MockStageExecutor::new();
        let ctx = test_ctx();
        executor.run(Stage::Analyze, &ctx).await.unwrap();
        executor.run(Stage::TranslateLogic, &ctx).await.unwrap();

        assert_eq!(
            executor.recorded_calls().await,
            vec![Stage::Analyze, Stage::TranslateLogic]
        );
    }
}
