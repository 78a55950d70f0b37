use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::executor::{ExecutorBackend, ExecutorConfig};
use crate::limiter::LimiterConfig;
use crate::pipeline::PipelineConfig;
use crate::reaper::ReaperConfig;
use crate::upload::UploadConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Stage executor wiring. Required: the service is useless without one.
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("modkiln.db")
}

/// Sanitized config for API responses (endpoint details redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub limiter: LimiterConfig,
    pub pipeline: PipelineConfig,
    pub executor: SanitizedExecutorConfig,
    pub reaper: ReaperConfig,
}

/// Sanitized executor config (endpoint URL hidden, only presence shown)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedExecutorConfig {
    pub backend: String,
    pub endpoint_configured: bool,
    pub timeout_secs: Option<u32>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            upload: config.upload.clone(),
            limiter: config.limiter.clone(),
            pipeline: config.pipeline.clone(),
            executor: SanitizedExecutorConfig {
                backend: match config.executor.backend {
                    ExecutorBackend::Http => "http".to_string(),
                },
                endpoint_configured: config
                    .executor
                    .http
                    .as_ref()
                    .map(|h| !h.url.is_empty())
                    .unwrap_or(false),
                timeout_secs: config.executor.http.as_ref().map(|h| h.timeout_secs),
            },
            reaper: config.reaper.clone(),
        }
    }
}
