//! Common test utilities for in-process API testing with a mock executor.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use modkiln_core::testing::MockStageExecutor;
use modkiln_core::{
    AdmissionController, Config, Database, DatabaseConfig, ExecutorBackend, ExecutorConfig,
    HttpExecutorConfig, JobStore, LimiterConfig, PipelineConfig, PipelineCoordinator, ReaperConfig,
    ResultAggregator, ServerConfig, SqliteJobStore, StageExecutor, UploadAssembler, UploadConfig,
};
use modkiln_server::api::create_router;
use modkiln_server::state::AppState;

/// Test fixture running the full router in-process with a mock executor.
pub struct TestFixture {
    /// The axum router for oneshot requests
    pub router: Router,
    /// Mock executor - script stage outcomes
    pub executor: Arc<MockStageExecutor>,
    /// Direct job store access for assertions
    pub jobs: Arc<dyn JobStore>,
    /// Direct upload assembler access for assertions
    pub uploads: Arc<UploadAssembler>,
    /// Temp directory backing the artifacts dir
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub retry_after: Option<String>,
}

impl TestFixture {
    /// Create a fixture with admission control disabled.
    pub async fn new() -> Self {
        let limiter = LimiterConfig {
            enabled: false,
            ..LimiterConfig::default()
        };
        Self::with_limiter(limiter).await
    }

    /// Create a fixture with the given limiter configuration.
    pub async fn with_limiter(limiter: LimiterConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            upload: UploadConfig {
                artifacts_dir: temp_dir.path().join("artifacts"),
                ..UploadConfig::default()
            },
            limiter: limiter.clone(),
            pipeline: PipelineConfig {
                max_retries: 2,
                retry_base_delay_ms: 1,
                stage_timeout_secs: 5,
                ..PipelineConfig::default()
            },
            executor: ExecutorConfig {
                backend: ExecutorBackend::Http,
                http: Some(HttpExecutorConfig {
                    url: "http://localhost:9200".to_string(),
                    timeout_secs: 5,
                }),
            },
            reaper: ReaperConfig::default(),
        };

        let db = Database::in_memory().expect("Failed to open in-memory db");
        let uploads = Arc::new(
            UploadAssembler::new(db.clone(), config.upload.clone())
                .expect("Failed to create upload assembler"),
        );
        let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(db.clone()));
        let aggregator = Arc::new(ResultAggregator::new(db));

        let executor = Arc::new(MockStageExecutor::new());
        let coordinator = Arc::new(PipelineCoordinator::new(
            config.pipeline.clone(),
            Arc::clone(&executor) as Arc<dyn StageExecutor>,
            Arc::clone(&jobs),
            Arc::clone(&aggregator),
        ));
        coordinator.start().await;

        let admission = Arc::new(AdmissionController::new(limiter));

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&uploads),
            Arc::clone(&jobs),
            aggregator,
            coordinator,
            admission,
        ));

        TestFixture {
            router: create_router(state),
            executor,
            jobs,
            uploads,
            temp_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            body,
            retry_after,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("bad request"),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("bad request"),
        )
        .await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .body(Body::empty())
                .expect("bad request"),
        )
        .await
    }

    pub async fn put_bytes(&self, path: &str, bytes: &'static [u8]) -> TestResponse {
        self.send(
            Request::builder()
                .method("PUT")
                .uri(path)
                .header("content-type", "application/octet-stream")
                .body(Body::from(bytes))
                .expect("bad request"),
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(path)
                .body(Body::empty())
                .expect("bad request"),
        )
        .await
    }

    /// Upload a three-chunk package and return the artifact id.
    pub async fn upload_artifact(&self) -> String {
        let created = self
            .post_json("/api/v1/uploads", serde_json::json!({"total_chunks": 3}))
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
        let session_id = created.body["session_id"].as_str().unwrap().to_string();

        for (index, payload) in [(0u32, "alpha"), (1, "beta"), (2, "gamma")] {
            let resp = self
                .put_bytes(
                    &format!("/api/v1/uploads/{}/chunks/{}", session_id, index),
                    payload.as_bytes(),
                )
                .await;
            assert_eq!(resp.status, StatusCode::OK);
        }

        let completed = self
            .post_empty(&format!("/api/v1/uploads/{}/complete", session_id))
            .await;
        assert_eq!(completed.status, StatusCode::CREATED);
        completed.body["artifact_id"].as_str().unwrap().to_string()
    }

    /// Create a job for an uploaded artifact and return its id.
    pub async fn create_job(&self, artifact_id: &str) -> String {
        let resp = self
            .post_json(
                "/api/v1/jobs",
                serde_json::json!({
                    "artifact_id": artifact_id,
                    "options": { "target_version": "2.0" }
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::ACCEPTED);
        assert_eq!(resp.body["status"], "queued");
        resp.body["job_id"].as_str().unwrap().to_string()
    }

    /// Poll a job until it reaches a terminal state.
    pub async fn wait_for_terminal(&self, job_id: &str) -> Value {
        for _ in 0..1000 {
            let resp = self.get(&format!("/api/v1/jobs/{}", job_id)).await;
            assert_eq!(resp.status, StatusCode::OK);
            let status = resp.body["status"].as_str().unwrap();
            if status == "completed" || status == "failed" {
                return resp.body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }
}
