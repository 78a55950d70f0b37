//! Token bucket admission control.
//!
//! Every entry point is guarded by a per-`(client, route)` token bucket.
//! Buckets are created lazily on first use and refilled from elapsed time, so
//! no timer task is needed and idle buckets can be evicted freely.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

/// Error returned when admission is denied.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Too many requests for this client/route pair.
    #[error("rate limited on {route}, retry after {retry_after_ms}ms")]
    RateLimited { route: String, retry_after_ms: u64 },
}

impl AdmissionError {
    /// Retry hint in milliseconds.
    pub fn retry_after_ms(&self) -> u64 {
        match self {
            AdmissionError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
        }
    }
}

/// Per-route bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLimit {
    /// Burst size.
    pub capacity: u32,
    /// Tokens added per second.
    pub refill_per_sec: f64,
}

/// Configuration for the admission controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Disable to admit everything (useful for tests and trusted deployments).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Default burst size for routes without an override.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Default refill rate (tokens per second) for routes without an override.
    #[serde(default = "default_refill")]
    pub refill_per_sec: f64,

    /// Buckets untouched for this long are dropped by the reaper sweep.
    #[serde(default = "default_idle_evict")]
    pub idle_evict_secs: u64,

    /// Per-route overrides, keyed by route template (e.g. "/api/v1/jobs").
    #[serde(default)]
    pub routes: HashMap<String, RouteLimit>,
}

fn default_enabled() -> bool {
    true
}

fn default_capacity() -> u32 {
    60
}

fn default_refill() -> f64 {
    1.0
}

fn default_idle_evict() -> u64 {
    600
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: default_capacity(),
            refill_per_sec: default_refill(),
            idle_evict_secs: default_idle_evict(),
            routes: HashMap::new(),
        }
    }
}

impl LimiterConfig {
    fn limit_for(&self, route: &str) -> RouteLimit {
        self.routes.get(route).cloned().unwrap_or(RouteLimit {
            capacity: self.capacity,
            refill_per_sec: self.refill_per_sec,
        })
    }
}

/// Token bucket for a single client/route pair.
///
/// Tokens are added at a constant rate up to the capacity and consumed one per
/// admission check.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(limit: &RouteLimit) -> Self {
        let capacity = limit.capacity as f64;
        Self {
            capacity,
            tokens: capacity, // start full
            refill_per_sec: limit.refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Try to withdraw one token.
    ///
    /// Returns `Err(wait)` with the time until one token is available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = deficit / self.refill_per_sec;
            Err(Duration::from_secs_f64(wait_secs))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.duration_since(self.last_refill)
    }
}

/// Admission controller guarding the service entry points.
pub struct AdmissionController {
    config: LimiterConfig,
    buckets: RwLock<HashMap<(String, String), TokenBucket>>,
}

impl AdmissionController {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Check admission for one request.
    ///
    /// The bucket is refilled and one token withdrawn under the registry
    /// write lock, so concurrent requests for the same key cannot double
    /// spend a token.
    pub async fn check(&self, client: &str, route: &str) -> Result<(), AdmissionError> {
        if !self.config.enabled {
            return Ok(());
        }

        let key = (client.to_string(), route.to_string());
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(&self.config.limit_for(route)));

        match bucket.try_acquire() {
            Ok(()) => Ok(()),
            Err(wait) => Err(AdmissionError::RateLimited {
                route: route.to_string(),
                retry_after_ms: wait.as_millis() as u64,
            }),
        }
    }

    /// Drop buckets that have not been touched for `max_idle`.
    ///
    /// Evicted buckets are recreated full on next use; after a long idle
    /// period the bucket would have refilled to capacity anyway.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.idle_for(now) < max_idle);
        before - buckets.len()
    }

    /// Number of live buckets.
    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// The configured idle window after which buckets are evictable.
    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.config.idle_evict_secs)
    }
}
