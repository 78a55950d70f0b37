//! Types crossing the stage execution boundary.

use serde::{Deserialize, Serialize};

use crate::job::{ConversionOptions, JobStatus};
use crate::upload::ArtifactRef;

/// One discrete step in the fixed conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyze,
    TranslateLogic,
    ConvertAssets,
    Package,
    Validate,
}

impl Stage {
    /// The fixed execution order.
    pub const SEQUENCE: [Stage; 5] = [
        Stage::Analyze,
        Stage::TranslateLogic,
        Stage::ConvertAssets,
        Stage::Package,
        Stage::Validate,
    ];

    /// The stage as a string tag.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::TranslateLogic => "translate_logic",
            Stage::ConvertAssets => "convert_assets",
            Stage::Package => "package",
            Stage::Validate => "validate",
        }
    }

    /// Parse a stage tag.
    pub fn from_name(name: &str) -> Option<Stage> {
        match name {
            "analyze" => Some(Stage::Analyze),
            "translate_logic" => Some(Stage::TranslateLogic),
            "convert_assets" => Some(Stage::ConvertAssets),
            "package" => Some(Stage::Package),
            "validate" => Some(Stage::Validate),
            _ => None,
        }
    }

    /// The job status a job holds while this stage runs.
    pub fn job_status(&self) -> JobStatus {
        match self {
            Stage::Analyze => JobStatus::Analyzing,
            Stage::TranslateLogic => JobStatus::Translating,
            Stage::ConvertAssets => JobStatus::ConvertingAssets,
            Stage::Package => JobStatus::Packaging,
            Stage::Validate => JobStatus::Validating,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result returned by a stage executor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Whether the stage produced its ideal output.
    pub success: bool,

    /// Stage output to fold into the job context (present on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StageOutput>,

    /// Substitutions the executor applied instead of failing outright.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_fallbacks: Vec<String>,

    /// Errors encountered (present on failure, possibly on success too).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Typed output of one pipeline stage.
///
/// Each variant carries named fields the coordinator understands, plus an
/// opaque `extra` map preserved for forward compatibility and never read by
/// the coordinator's own control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageOutput {
    Analysis(AnalysisOutput),
    Translation(TranslationOutput),
    Assets(AssetOutput),
    Package(PackageOutput),
    Validation(ValidationOutput),
}

/// Output of the analyze stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Name declared by the package manifest.
    pub mod_name: String,
    /// Source format the package was authored for.
    pub source_format: String,
    /// Features detected in the package (scripting, custom assets, ...).
    #[serde(default)]
    pub detected_features: Vec<String>,
    /// Number of logic/script files found.
    #[serde(default)]
    pub script_files: u32,
    /// Number of asset files found.
    #[serde(default)]
    pub asset_files: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Output of the translate_logic stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranslationOutput {
    /// Scripts translated to the target format.
    #[serde(default)]
    pub translated_scripts: u32,
    /// Scripts left untranslated (with recorded notes).
    #[serde(default)]
    pub skipped_scripts: u32,
    /// Human-readable translation notes.
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Output of the convert_assets stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetOutput {
    #[serde(default)]
    pub converted_assets: u32,
    #[serde(default)]
    pub skipped_assets: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Output of the package stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageOutput {
    /// Where the repacked output landed.
    pub package_path: String,
    pub package_size_bytes: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Output of the validate stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationOutput {
    #[serde(default)]
    pub checks_passed: u32,
    #[serde(default)]
    pub checks_failed: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The accumulating per-job context handed to each stage.
///
/// Stage outputs merge additively: each stage sees everything its
/// predecessors produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    pub job_id: String,
    /// The assembled input artifact.
    pub artifact: ArtifactRef,
    /// Client-supplied conversion options.
    pub options: ConversionOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<AssetOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutput>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, artifact: ArtifactRef, options: ConversionOptions) -> Self {
        Self {
            job_id: job_id.into(),
            artifact,
            options,
            analysis: None,
            translation: None,
            assets: None,
            package: None,
            validation: None,
        }
    }

    /// Fold a stage output into the context.
    pub fn fold(&mut self, output: StageOutput) {
        match output {
            StageOutput::Analysis(o) => self.analysis = Some(o),
            StageOutput::Translation(o) => self.translation = Some(o),
            StageOutput::Assets(o) => self.assets = Some(o),
            StageOutput::Package(o) => self.package = Some(o),
            StageOutput::Validation(o) => self.validation = Some(o),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_artifact() -> ArtifactRef {
        ArtifactRef {
            artifact_id: "a-1".to_string(),
            path: PathBuf::from("/data/artifacts/a-1.pkg"),
            size_bytes: 100,
            sha256: "cafe".to_string(),
        }
    }

    #[test]
    fn test_sequence_covers_every_stage() {
        assert_eq!(Stage::SEQUENCE.len(), 5);
        for stage in Stage::SEQUENCE {
            assert_eq!(Stage::from_name(stage.name()), Some(stage));
        }
    }

    #[test]
    fn test_stage_status_mapping() {
        assert_eq!(Stage::Analyze.job_status(), JobStatus::Analyzing);
        assert_eq!(Stage::Package.job_status(), JobStatus::Packaging);
        assert_eq!(Stage::Validate.job_status(), JobStatus::Validating);
    }

    #[test]
    fn test_fold_merges_additively() {
        let mut ctx = JobContext::new("job-1", test_artifact(), ConversionOptions::new("2.0"));

        ctx.fold(StageOutput::Analysis(AnalysisOutput {
            mod_name: "test-mod".to_string(),
            source_format: "legacy".to_string(),
            ..AnalysisOutput::default()
        }));
        ctx.fold(StageOutput::Translation(TranslationOutput {
            translated_scripts: 12,
            ..TranslationOutput::default()
        }));

        assert_eq!(ctx.analysis.as_ref().unwrap().mod_name, "test-mod");
        assert_eq!(ctx.translation.as_ref().unwrap().translated_scripts, 12);
        assert!(ctx.assets.is_none());
    }

    #[test]
    fn test_stage_output_serialization() {
        let output = StageOutput::Package(PackageOutput {
            package_path: "/out/mod.pkg".to_string(),
            package_size_bytes: 2048,
            extra: serde_json::Map::new(),
        });
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"stage\":\"package\""));

        let parsed: StageOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, output);
    }

    #[test]
    fn test_stage_output_preserves_unknown_fields() {
        let json = r#"{
            "stage": "analysis",
            "mod_name": "m",
            "source_format": "legacy",
            "engine_hint": "v3"
        }"#;
        let output: StageOutput = serde_json::from_str(json).unwrap();
        let StageOutput::Analysis(analysis) = &output else {
            panic!("expected analysis output");
        };
        assert_eq!(
            analysis.extra.get("engine_hint").and_then(|v| v.as_str()),
            Some("v3")
        );

        let back = serde_json::to_string(&output).unwrap();
        assert!(back.contains("engine_hint"));
    }

    #[test]
    fn test_stage_result_defaults() {
        let json = r#"{"success": true}"#;
        let result: StageResult = serde_json::from_str(json).unwrap();
        assert!(result.success);
        assert!(result.output.is_none());
        assert!(result.applied_fallbacks.is_empty());
        assert!(result.errors.is_empty());
    }
}
