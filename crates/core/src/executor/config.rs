//! Executor backend configuration.

use serde::{Deserialize, Serialize};

/// Stage executor wiring.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Executor backend type.
    pub backend: ExecutorBackend,
    /// HTTP-specific configuration (required when backend = "http").
    #[serde(default)]
    pub http: Option<HttpExecutorConfig>,
}

/// Available executor backends.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorBackend {
    Http,
    // Future: InProcess, Grpc
}

/// HTTP executor backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpExecutorConfig {
    /// Executor service base URL (e.g. "http://localhost:9200").
    pub url: String,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_http_backend() {
        let toml = r#"
            backend = "http"

            [http]
            url = "http://localhost:9200"
        "#;
        let config: ExecutorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backend, ExecutorBackend::Http);
        let http = config.http.unwrap();
        assert_eq!(http.url, "http://localhost:9200");
        assert_eq!(http.timeout_secs, 120);
    }

    #[test]
    fn test_deserialize_custom_timeout() {
        let toml = r#"
            backend = "http"

            [http]
            url = "http://localhost:9200"
            timeout_secs = 30
        "#;
        let config: ExecutorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.http.unwrap().timeout_secs, 30);
    }
}
