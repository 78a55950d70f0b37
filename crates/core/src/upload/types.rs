//! Types for the upload module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A newly created upload session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Opaque session token.
    pub session_id: String,
    /// Number of chunks the session expects.
    pub total_chunks: u32,
    /// When the session expires if not completed.
    pub expires_at: DateTime<Utc>,
}

/// Progress of an in-flight upload session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Chunks received so far.
    pub received: u32,
    /// Chunks expected in total.
    pub total_chunks: u32,
}

/// Outcome of a single chunk submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkDisposition {
    /// Chunk stored.
    Accepted,
    /// Chunk index was already received; no mutation performed.
    Duplicate,
    /// Chunk stored and the session now holds every chunk.
    Complete,
}

/// Receipt returned for each chunk submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReceipt {
    pub status: ChunkDisposition,
    pub received: u32,
    pub total_chunks: u32,
}

/// Reference to a materialized artifact.
///
/// Produced exactly once per completed session; jobs hold this as their input
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Unique artifact id.
    pub artifact_id: String,
    /// Path of the assembled package on disk.
    pub path: PathBuf,
    /// Assembled size in bytes.
    pub size_bytes: u64,
    /// SHA-256 of the assembled bytes.
    pub sha256: String,
}
