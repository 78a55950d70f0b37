//! Chunked upload assembly.
//!
//! Large mod packages arrive as numbered chunks against a session. Chunks may
//! arrive in any order and may be resent; the assembled artifact is always the
//! concatenation in index order, materialized exactly once.

mod assembler;
mod config;
mod types;

pub use assembler::UploadAssembler;
pub use config::UploadConfig;
pub use types::{ArtifactRef, ChunkDisposition, ChunkReceipt, SessionInfo, UploadProgress};

use thiserror::Error;

/// Errors from upload session operations.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Malformed input (bad chunk count, index out of range, oversized chunk).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown or expired session, or unknown artifact.
    #[error("upload session not found: {0}")]
    NotFound(String),

    /// Completion requested before all chunks arrived.
    #[error("upload session {session_id} is incomplete: {received}/{total_chunks} chunks received")]
    Incomplete {
        session_id: String,
        received: u32,
        total_chunks: u32,
    },

    /// Durable store or filesystem failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for UploadError {
    fn from(e: rusqlite::Error) -> Self {
        UploadError::Storage(e.to_string())
    }
}
