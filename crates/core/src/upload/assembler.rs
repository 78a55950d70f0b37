//! Upload assembler implementation.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::storage::Database;

use super::config::UploadConfig;
use super::types::{ArtifactRef, ChunkDisposition, ChunkReceipt, SessionInfo, UploadProgress};
use super::UploadError;

/// Assembles chunked uploads into artifacts.
///
/// Sessions and their chunk payloads live in the shared database; completed
/// artifacts are written to the artifacts directory. All mutations for one
/// session are serialized by the database handle, so concurrent completion
/// attempts yield exactly one materialization.
pub struct UploadAssembler {
    db: Database,
    config: UploadConfig,
}

impl UploadAssembler {
    /// Create a new assembler, ensuring the artifacts directory exists.
    pub fn new(db: Database, config: UploadConfig) -> Result<Self, UploadError> {
        std::fs::create_dir_all(&config.artifacts_dir)
            .map_err(|e| UploadError::Storage(format!("failed to create artifacts dir: {}", e)))?;
        Ok(Self { db, config })
    }

    /// Create a new upload session expecting `total_chunks` chunks.
    pub fn init_session(&self, total_chunks: u32) -> Result<SessionInfo, UploadError> {
        if total_chunks == 0 {
            return Err(UploadError::InvalidArgument(
                "total_chunks must be positive".to_string(),
            ));
        }
        if total_chunks > self.config.max_chunks {
            return Err(UploadError::InvalidArgument(format!(
                "total_chunks {} exceeds the maximum of {}",
                total_chunks, self.config.max_chunks
            )));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.session_ttl_secs as i64);

        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO upload_sessions (session_id, total_chunks, created_at, expires_at) VALUES (?, ?, ?, ?)",
            params![session_id, total_chunks, now.to_rfc3339(), expires_at.to_rfc3339()],
        )?;

        debug!(session_id = %session_id, total_chunks, "Upload session created");

        Ok(SessionInfo {
            session_id,
            total_chunks,
            expires_at,
        })
    }

    /// Store one chunk. Resending an already-received index is a no-op.
    pub fn put_chunk(
        &self,
        session_id: &str,
        index: u32,
        payload: Bytes,
    ) -> Result<ChunkReceipt, UploadError> {
        if payload.len() as u64 > self.config.max_chunk_bytes {
            return Err(UploadError::InvalidArgument(format!(
                "chunk of {} bytes exceeds the maximum of {}",
                payload.len(),
                self.config.max_chunk_bytes
            )));
        }

        let conn = self.db.lock();
        let total_chunks = Self::live_session(&conn, session_id)?;

        if index >= total_chunks {
            return Err(UploadError::InvalidArgument(format!(
                "chunk index {} is outside [0, {})",
                index, total_chunks
            )));
        }

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO upload_chunks (session_id, chunk_index, payload) VALUES (?, ?, ?)",
            params![session_id, index, payload.as_ref()],
        )?;

        let received = Self::received_count(&conn, session_id)?;

        let status = if inserted == 0 {
            ChunkDisposition::Duplicate
        } else if received == total_chunks {
            ChunkDisposition::Complete
        } else {
            ChunkDisposition::Accepted
        };

        Ok(ChunkReceipt {
            status,
            received,
            total_chunks,
        })
    }

    /// Report how many chunks a session holds.
    pub fn progress(&self, session_id: &str) -> Result<UploadProgress, UploadError> {
        let conn = self.db.lock();
        let total_chunks = Self::live_session(&conn, session_id)?;
        let received = Self::received_count(&conn, session_id)?;
        Ok(UploadProgress {
            received,
            total_chunks,
        })
    }

    /// Materialize the assembled artifact and invalidate the session.
    ///
    /// Chunks concatenate in index order regardless of arrival order. The
    /// session rows are deleted in the same transaction that records the
    /// artifact, so a second completion attempt observes `NotFound`. If the
    /// file write fails the transaction rolls back and the session survives
    /// for a retry.
    pub fn complete(&self, session_id: &str) -> Result<ArtifactRef, UploadError> {
        let mut conn = self.db.lock();
        let tx = conn
            .transaction()
            .map_err(|e| UploadError::Storage(e.to_string()))?;

        let total_chunks = Self::live_session(&tx, session_id)?;

        let mut stmt = tx
            .prepare(
                "SELECT payload FROM upload_chunks WHERE session_id = ? ORDER BY chunk_index ASC",
            )
            .map_err(UploadError::from)?;
        let chunks: Vec<Vec<u8>> = stmt
            .query_map(params![session_id], |row| row.get(0))
            .map_err(UploadError::from)?
            .collect::<Result<_, _>>()
            .map_err(UploadError::from)?;
        drop(stmt);

        if (chunks.len() as u32) < total_chunks {
            return Err(UploadError::Incomplete {
                session_id: session_id.to_string(),
                received: chunks.len() as u32,
                total_chunks,
            });
        }

        let mut hasher = Sha256::new();
        let mut assembled = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
        for chunk in &chunks {
            hasher.update(chunk);
            assembled.extend_from_slice(chunk);
        }
        let sha256 = format!("{:x}", hasher.finalize());

        let artifact_id = uuid::Uuid::new_v4().to_string();
        let path = self.config.artifacts_dir.join(format!("{}.pkg", artifact_id));
        let size_bytes = assembled.len() as u64;
        let now = Utc::now();

        tx.execute(
            "DELETE FROM upload_chunks WHERE session_id = ?",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM upload_sessions WHERE session_id = ?",
            params![session_id],
        )?;
        tx.execute(
            "INSERT INTO artifacts (artifact_id, path, size_bytes, sha256, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                artifact_id,
                path.to_string_lossy(),
                size_bytes,
                sha256,
                now.to_rfc3339()
            ],
        )?;

        // Write to a partial file first so a crash never leaves a truncated
        // artifact under the final name.
        let part_path = path.with_extension("pkg.part");
        if let Err(e) = std::fs::write(&part_path, &assembled) {
            let _ = std::fs::remove_file(&part_path);
            return Err(UploadError::Storage(format!(
                "failed to write artifact: {}",
                e
            )));
        }
        if let Err(e) = std::fs::rename(&part_path, &path) {
            let _ = std::fs::remove_file(&part_path);
            return Err(UploadError::Storage(format!(
                "failed to finalize artifact: {}",
                e
            )));
        }

        if let Err(e) = tx.commit() {
            let _ = std::fs::remove_file(&path);
            return Err(UploadError::Storage(e.to_string()));
        }

        info!(
            session_id = %session_id,
            artifact_id = %artifact_id,
            size_bytes,
            "Upload session materialized"
        );

        Ok(ArtifactRef {
            artifact_id,
            path,
            size_bytes,
            sha256,
        })
    }

    /// Release a session and its chunk storage. Idempotent.
    pub fn cancel(&self, session_id: &str) -> Result<(), UploadError> {
        let conn = self.db.lock();
        Self::purge_session(&conn, session_id)?;
        Ok(())
    }

    /// Look up a previously materialized artifact.
    pub fn artifact(&self, artifact_id: &str) -> Result<Option<ArtifactRef>, UploadError> {
        let conn = self.db.lock();
        let artifact = conn
            .query_row(
                "SELECT artifact_id, path, size_bytes, sha256 FROM artifacts WHERE artifact_id = ?",
                params![artifact_id],
                |row| {
                    Ok(ArtifactRef {
                        artifact_id: row.get(0)?,
                        path: std::path::PathBuf::from(row.get::<_, String>(1)?),
                        size_bytes: row.get(2)?,
                        sha256: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(UploadError::from)?;
        Ok(artifact)
    }

    /// Remove every session whose `expires_at` has passed. Returns the number
    /// of sessions evicted.
    pub fn sweep_expired(&self) -> Result<usize, UploadError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.lock();

        let mut stmt = conn
            .prepare("SELECT session_id FROM upload_sessions WHERE expires_at < ?")
            .map_err(UploadError::from)?;
        let expired: Vec<String> = stmt
            .query_map(params![now], |row| row.get(0))
            .map_err(UploadError::from)?
            .collect::<Result<_, _>>()
            .map_err(UploadError::from)?;
        drop(stmt);

        for session_id in &expired {
            Self::purge_session(&conn, session_id)?;
            warn!(session_id = %session_id, "Expired upload session evicted");
        }

        Ok(expired.len())
    }

    /// Number of live sessions (expired ones included until the next sweep).
    pub fn active_sessions(&self) -> Result<usize, UploadError> {
        let conn = self.db.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM upload_sessions", [], |row| row.get(0))
            .map_err(UploadError::from)?;
        Ok(count as usize)
    }

    /// Fetch a session's chunk count, purging it lazily when expired.
    fn live_session(conn: &Connection, session_id: &str) -> Result<u32, UploadError> {
        let row: Option<(u32, String)> = conn
            .query_row(
                "SELECT total_chunks, expires_at FROM upload_sessions WHERE session_id = ?",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(UploadError::from)?;

        let Some((total_chunks, expires_at)) = row else {
            return Err(UploadError::NotFound(session_id.to_string()));
        };

        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|t| t.with_timezone(&Utc) < Utc::now())
            .unwrap_or(true);
        if expired {
            Self::purge_session(conn, session_id)?;
            return Err(UploadError::NotFound(session_id.to_string()));
        }

        Ok(total_chunks)
    }

    fn received_count(conn: &Connection, session_id: &str) -> Result<u32, UploadError> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM upload_chunks WHERE session_id = ?",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(UploadError::from)?;
        Ok(count as u32)
    }

    fn purge_session(conn: &Connection, session_id: &str) -> Result<(), UploadError> {
        conn.execute(
            "DELETE FROM upload_chunks WHERE session_id = ?",
            params![session_id],
        )?;
        conn.execute(
            "DELETE FROM upload_sessions WHERE session_id = ?",
            params![session_id],
        )?;
        Ok(())
    }
}
