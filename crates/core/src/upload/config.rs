//! Upload assembler configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the upload assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory where completed artifacts are materialized.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// How long an upload session stays alive without completing.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Maximum number of chunks a session may declare.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: u32,

    /// Maximum size of a single chunk in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("data/artifacts")
}

fn default_session_ttl() -> u64 {
    900 // 15 minutes
}

fn default_max_chunks() -> u32 {
    4096
}

fn default_max_chunk_bytes() -> u64 {
    16 * 1024 * 1024 // 16 MiB
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            session_ttl_secs: default_session_ttl(),
            max_chunks: default_max_chunks(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}
