//! Pipeline coordinator implementation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::executor::{JobContext, Stage, StageExecutor};
use crate::job::{ConversionJob, JobError, JobFilter, JobStatus, JobStore};
use crate::report::{ReportError, ResultAggregator};

use super::config::PipelineConfig;
use super::types::{CoordinatorStatus, StageOutcome};

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Coordinator has not been started (or was stopped).
    #[error("pipeline coordinator is not running")]
    NotRunning,

    /// A second concurrent execution for the same job was refused.
    #[error("job is already executing: {0}")]
    AlreadyRunning(String),

    /// Only queued jobs can be submitted.
    #[error("job {job_id} is not queued (status: {status})")]
    NotQueued { job_id: String, status: String },

    /// Job store failure.
    #[error(transparent)]
    Store(#[from] JobError),

    /// Result finalization failure.
    #[error(transparent)]
    Finalize(#[from] ReportError),
}

/// Counters for completed pipeline runs.
#[derive(Default)]
struct RunStats {
    completed: AtomicU64,
    failed: AtomicU64,
    degraded: AtomicU64,
}

/// Drives jobs through the fixed stage sequence.
///
/// Each submitted job executes on its own task so one slow job never blocks
/// another. At most one execution per job is in flight at any time.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    executor: Arc<dyn StageExecutor>,
    jobs: Arc<dyn JobStore>,
    aggregator: Arc<ResultAggregator>,
    active: Arc<RwLock<HashSet<String>>>,
    running: Arc<RwLock<bool>>,
    stats: Arc<RunStats>,
}

impl PipelineCoordinator {
    /// Creates a new pipeline coordinator.
    pub fn new(
        config: PipelineConfig,
        executor: Arc<dyn StageExecutor>,
        jobs: Arc<dyn JobStore>,
        aggregator: Arc<ResultAggregator>,
    ) -> Self {
        Self {
            config,
            executor,
            jobs,
            aggregator,
            active: Arc::new(RwLock::new(HashSet::new())),
            running: Arc::new(RwLock::new(false)),
            stats: Arc::new(RunStats::default()),
        }
    }

    /// Start accepting submissions and resume jobs left queued by a previous
    /// run.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }
        self.recover_queued_jobs().await;
    }

    /// Stop accepting submissions. In-flight jobs finish their current stage
    /// sequence.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    /// Returns the current coordinator status.
    pub async fn status(&self) -> CoordinatorStatus {
        let active = self.active.read().await;
        CoordinatorStatus {
            running: *self.running.read().await,
            active_jobs: active.iter().cloned().collect(),
            total_completed: self.stats.completed.load(Ordering::Relaxed),
            total_failed: self.stats.failed.load(Ordering::Relaxed),
            total_degraded: self.stats.degraded.load(Ordering::Relaxed),
        }
    }

    /// Whether a job is currently executing.
    pub async fn is_executing(&self, job_id: &str) -> bool {
        self.active.read().await.contains(job_id)
    }

    /// Submit a queued job for execution.
    ///
    /// Returns immediately; the pipeline runs in the background. A job that
    /// is already executing, or not in `queued`, is refused.
    pub async fn submit(&self, job_id: &str) -> Result<(), PipelineError> {
        if !*self.running.read().await {
            return Err(PipelineError::NotRunning);
        }

        let job = self
            .jobs
            .get(job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Queued {
            return Err(PipelineError::NotQueued {
                job_id: job_id.to_string(),
                status: job.status.as_str().to_string(),
            });
        }

        {
            let mut active = self.active.write().await;
            if !active.insert(job_id.to_string()) {
                return Err(PipelineError::AlreadyRunning(job_id.to_string()));
            }
        }

        let job_id = job_id.to_string();
        let config = self.config.clone();
        let executor = Arc::clone(&self.executor);
        let jobs = Arc::clone(&self.jobs);
        let aggregator = Arc::clone(&self.aggregator);
        let active = Arc::clone(&self.active);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let result = Self::run_job(job, config, executor, jobs, aggregator, stats).await;
            if let Err(e) = result {
                error!(job_id = %job_id, "Pipeline execution error: {}", e);
            }
            active.write().await.remove(&job_id);
        });

        Ok(())
    }

    /// Re-submit jobs that were queued when the service last stopped.
    async fn recover_queued_jobs(&self) {
        let filter = JobFilter::new().with_status("queued").with_limit(1000);
        match self.jobs.list(&filter) {
            Ok(queued) => {
                for job in queued {
                    match self.submit(&job.id).await {
                        Ok(()) => info!(job_id = %job.id, "Recovered queued job"),
                        Err(e) => warn!(job_id = %job.id, "Failed to recover queued job: {}", e),
                    }
                }
            }
            Err(e) => error!("Failed to list queued jobs for recovery: {}", e),
        }
    }

    /// Runs the full stage sequence for one job.
    async fn run_job(
        job: ConversionJob,
        config: PipelineConfig,
        executor: Arc<dyn StageExecutor>,
        jobs: Arc<dyn JobStore>,
        aggregator: Arc<ResultAggregator>,
        stats: Arc<RunStats>,
    ) -> Result<(), PipelineError> {
        let job_id = job.id.clone();
        let mut ctx = JobContext::new(&job_id, job.artifact, job.options);
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(Stage::SEQUENCE.len());
        let total_stages = Stage::SEQUENCE.len();

        for (idx, stage) in Stage::SEQUENCE.into_iter().enumerate() {
            // Cancellation is observed at stage boundaries only; the executor
            // call itself is opaque.
            let snapshot = jobs
                .get(&job_id)?
                .ok_or_else(|| JobError::NotFound(job_id.clone()))?;
            if snapshot.cancel_requested {
                info!(job_id = %job_id, stage = %stage, "Cancellation observed at stage boundary");
                jobs.fail(&job_id, "cancelled by client")?;
                stats.failed.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }

            jobs.transition(&job_id, stage.job_status())?;
            debug!(job_id = %job_id, stage = %stage, "Stage started");

            match Self::run_stage_with_retries(&job_id, stage, &ctx, &config, executor.as_ref())
                .await
            {
                StageAttempts::Succeeded {
                    attempts,
                    output,
                    applied_fallbacks,
                } => {
                    if let Some(output) = output {
                        ctx.fold(output);
                    }
                    outcomes.push(StageOutcome::Succeeded {
                        stage,
                        attempts,
                        applied_fallbacks,
                    });
                }
                StageAttempts::Exhausted { attempts, errors } => {
                    if config.is_best_effort(stage) {
                        let explanation = format!(
                            "stage '{}' was skipped after {} failed attempts; later stages proceeded on recorded assumptions",
                            stage.name(),
                            attempts
                        );
                        warn!(job_id = %job_id, stage = %stage, "Stage degraded: {}", explanation);
                        outcomes.push(StageOutcome::Degraded {
                            stage,
                            attempts,
                            explanation,
                            errors,
                        });
                    } else {
                        let reason = format!(
                            "required stage '{}' failed after {} attempts: {}",
                            stage.name(),
                            attempts,
                            errors.last().map(String::as_str).unwrap_or("unknown error")
                        );
                        warn!(job_id = %job_id, stage = %stage, "Job failed: {}", reason);
                        jobs.fail(&job_id, &reason)?;
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        return Ok(());
                    }
                }
            }

            let percent = ((idx + 1) * 100 / total_stages) as u8;
            jobs.update_progress(&job_id, percent, stage.name())?;
        }

        let degraded = outcomes.iter().any(|o| o.is_degraded());
        aggregator.finalize(&job_id, &outcomes, &ctx)?;
        stats.completed.fetch_add(1, Ordering::Relaxed);
        if degraded {
            stats.degraded.fetch_add(1, Ordering::Relaxed);
        }
        info!(job_id = %job_id, degraded, "Pipeline run completed");

        Ok(())
    }

    /// Run one stage with the bounded retry loop.
    async fn run_stage_with_retries(
        job_id: &str,
        stage: Stage,
        ctx: &JobContext,
        config: &PipelineConfig,
        executor: &dyn StageExecutor,
    ) -> StageAttempts {
        let max_attempts = config.max_retries + 1;
        let timeout = Duration::from_secs(config.stage_timeout_secs);
        let mut errors: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = config.backoff_delay_ms(attempt - 1);
                debug!(
                    job_id = %job_id,
                    stage = %stage,
                    attempt,
                    delay_ms = delay,
                    "Retrying stage after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match tokio::time::timeout(timeout, executor.run(stage, ctx)).await {
                Ok(Ok(result)) if result.success => {
                    return StageAttempts::Succeeded {
                        attempts: attempt,
                        output: result.output,
                        applied_fallbacks: result.applied_fallbacks,
                    };
                }
                Ok(Ok(result)) => {
                    if result.errors.is_empty() {
                        errors.push(format!("stage '{}' reported failure", stage.name()));
                    } else {
                        errors.extend(result.errors);
                    }
                }
                Ok(Err(e)) => {
                    errors.push(e.to_string());
                }
                Err(_) => {
                    errors.push(format!(
                        "stage '{}' timed out after {}s",
                        stage.name(),
                        config.stage_timeout_secs
                    ));
                }
            }
        }

        StageAttempts::Exhausted {
            attempts: max_attempts,
            errors,
        }
    }
}

/// Outcome of the retry loop for one stage.
enum StageAttempts {
    Succeeded {
        attempts: u32,
        output: Option<crate::executor::StageOutput>,
        applied_fallbacks: Vec<String>,
    },
    Exhausted {
        attempts: u32,
        errors: Vec<String>,
    },
}
