//! Background expiry sweeping.
//!
//! A periodic task that evicts expired upload sessions, fails jobs stuck in a
//! non-terminal state past the stall deadline, and drops idle rate-limiter
//! buckets. Sweeps use the same primitives as normal request handling, so
//! they are safe to run concurrently with it; a failed sweep is logged and
//! retried on the next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::job::JobStore;
use crate::limiter::AdmissionController;
use crate::upload::UploadAssembler;

/// Configuration for the expiry reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Enable/disable the background sweep.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_interval")]
    pub sweep_interval_secs: u64,

    /// A non-terminal job untouched for this long is failed with a timeout.
    #[serde(default = "default_stall_timeout")]
    pub job_stall_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

fn default_stall_timeout() -> u64 {
    1800 // 30 minutes
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_secs: default_interval(),
            job_stall_timeout_secs: default_stall_timeout(),
        }
    }
}

/// Maximum stuck jobs handled per sweep; the rest wait for the next cycle.
const STUCK_JOBS_PER_SWEEP: i64 = 100;

/// The background expiry reaper.
pub struct ExpiryReaper {
    config: ReaperConfig,
    uploads: Arc<UploadAssembler>,
    jobs: Arc<dyn JobStore>,
    limiter: Arc<AdmissionController>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ExpiryReaper {
    pub fn new(
        config: ReaperConfig,
        uploads: Arc<UploadAssembler>,
        jobs: Arc<dyn JobStore>,
        limiter: Arc<AdmissionController>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            uploads,
            jobs,
            limiter,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the sweep loop.
    pub fn start(&self) {
        if !self.config.enabled {
            info!("Expiry reaper disabled in config");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Expiry reaper already running");
            return;
        }

        let config = self.config.clone();
        let uploads = Arc::clone(&self.uploads);
        let jobs = Arc::clone(&self.jobs);
        let limiter = Arc::clone(&self.limiter);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(
                interval_secs = config.sweep_interval_secs,
                "Expiry reaper started"
            );
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Expiry reaper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(config.sweep_interval_secs)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::sweep(&config, &uploads, &jobs, &limiter).await;
                    }
                }
            }
            info!("Expiry reaper stopped");
        });
    }

    /// Stop the sweep loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Run one sweep immediately (also used by the loop).
    pub async fn sweep_once(&self) {
        Self::sweep(&self.config, &self.uploads, &self.jobs, &self.limiter).await;
    }

    async fn sweep(
        config: &ReaperConfig,
        uploads: &Arc<UploadAssembler>,
        jobs: &Arc<dyn JobStore>,
        limiter: &Arc<AdmissionController>,
    ) {
        match uploads.sweep_expired() {
            Ok(0) => {}
            Ok(count) => info!(count, "Swept expired upload sessions"),
            Err(e) => warn!("Upload sweep failed: {}", e),
        }

        let cutoff = Utc::now() - chrono::Duration::seconds(config.job_stall_timeout_secs as i64);
        match jobs.list_stuck(cutoff, STUCK_JOBS_PER_SWEEP) {
            Ok(stuck) => {
                for job in stuck {
                    let reason = format!(
                        "job stalled in state '{}' for more than {}s",
                        job.status.as_str(),
                        config.job_stall_timeout_secs
                    );
                    match jobs.fail(&job.id, &reason) {
                        Ok(_) => warn!(job_id = %job.id, "Stuck job failed by reaper: {}", reason),
                        // A concurrent transition beat the sweep; the job is
                        // live again and will be reconsidered next cycle.
                        Err(e) => debug!(job_id = %job.id, "Skipping stuck job: {}", e),
                    }
                }
            }
            Err(e) => warn!("Stuck job sweep failed: {}", e),
        }

        let evicted = limiter.evict_idle(limiter.idle_window()).await;
        if evicted > 0 {
            debug!(evicted, "Evicted idle rate limiter buckets");
        }
    }
}
