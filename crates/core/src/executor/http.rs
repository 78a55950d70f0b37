//! HTTP stage executor backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::config::HttpExecutorConfig;
use super::error::ExecutorError;
use super::traits::StageExecutor;
use super::types::{JobContext, Stage, StageResult};

/// Stage executor that forwards each stage to a remote executor service.
///
/// The service receives `{stage, context}` and answers with a `StageResult`
/// payload; anything else is an invalid response.
pub struct HttpStageExecutor {
    client: Client,
    config: HttpExecutorConfig,
}

#[derive(Serialize)]
struct StageRequest<'a> {
    stage: &'a str,
    context: &'a JobContext,
}

impl HttpStageExecutor {
    /// Create a new HTTP executor with the given configuration.
    pub fn new(config: HttpExecutorConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ExecutorError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn stage_url(&self, stage: Stage) -> String {
        format!(
            "{}/v1/stages/{}",
            self.config.url.trim_end_matches('/'),
            stage.name()
        )
    }
}

#[async_trait]
impl StageExecutor for HttpStageExecutor {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(&self, stage: Stage, ctx: &JobContext) -> Result<StageResult, ExecutorError> {
        let url = self.stage_url(stage);
        debug!(stage = %stage, job_id = %ctx.job_id, "Dispatching stage to executor");

        let response = self
            .client
            .post(&url)
            .json(&StageRequest {
                stage: stage.name(),
                context: ctx,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutorError::Timeout
                } else if e.is_connect() {
                    ExecutorError::ConnectionFailed(e.to_string())
                } else {
                    ExecutorError::Api(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Api(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let result: StageResult = response
            .json()
            .await
            .map_err(|e| ExecutorError::InvalidResponse(e.to_string()))?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_url_building() {
        let executor = HttpStageExecutor::new(HttpExecutorConfig {
            url: "http://localhost:9200/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(
            executor.stage_url(Stage::TranslateLogic),
            "http://localhost:9200/v1/stages/translate_logic"
        );
        assert_eq!(
            executor.stage_url(Stage::Analyze),
            "http://localhost:9200/v1/stages/analyze"
        );
    }

    #[test]
    fn test_executor_name() {
        let executor = HttpStageExecutor::new(HttpExecutorConfig {
            url: "http://localhost:9200".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(executor.name(), "http");
    }
}
