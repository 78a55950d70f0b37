use crate::executor::{ExecutorBackend, Stage};

use super::{types::Config, ConfigError};

/// Validate configuration beyond what serde enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.upload.max_chunks == 0 {
        return Err(ConfigError::ValidationError(
            "upload.max_chunks must be positive".to_string(),
        ));
    }

    if config.upload.max_chunk_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "upload.max_chunk_bytes must be positive".to_string(),
        ));
    }

    if config.limiter.enabled {
        if config.limiter.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "limiter.capacity must be positive when the limiter is enabled".to_string(),
            ));
        }
        if config.limiter.refill_per_sec <= 0.0 {
            return Err(ConfigError::ValidationError(
                "limiter.refill_per_sec must be positive when the limiter is enabled".to_string(),
            ));
        }
        for (route, limit) in &config.limiter.routes {
            if limit.capacity == 0 || limit.refill_per_sec <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "limiter.routes.{} must have positive capacity and refill rate",
                    route
                )));
            }
        }
    }

    if config.pipeline.stage_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.stage_timeout_secs must be positive".to_string(),
        ));
    }

    for name in &config.pipeline.best_effort_stages {
        if Stage::from_name(name).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.best_effort_stages contains unknown stage '{}'",
                name
            )));
        }
    }

    match config.executor.backend {
        ExecutorBackend::Http => {
            let Some(http) = &config.executor.http else {
                return Err(ConfigError::ValidationError(
                    "executor.backend is 'http' but no [executor.http] section is provided"
                        .to_string(),
                ));
            };
            if !http.url.starts_with("http://") && !http.url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "executor.http.url must be an http(s) URL, got '{}'",
                    http.url
                )));
            }
        }
    }

    if config.reaper.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reaper.sweep_interval_secs must be positive".to_string(),
        ));
    }

    Ok(())
}
