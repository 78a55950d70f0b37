//! SQLite-backed job store implementation.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};

use crate::storage::Database;
use crate::upload::ArtifactRef;

use super::store::{JobError, JobFilter, JobStore};
use super::types::{ConversionJob, ConversionOptions, JobInput, JobProgress, JobStatus};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ConversionJob> {
        let id: String = row.get(0)?;
        let status_str: String = row.get(1)?;
        let artifact_json: String = row.get(2)?;
        let options_json: String = row.get(3)?;
        let cancel_requested: bool = row.get(4)?;
        let failure: Option<String> = row.get(5)?;
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        let status = JobStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("unknown job status '{}'", status_str).into(),
            )
        })?;

        let artifact: ArtifactRef = serde_json::from_str(&artifact_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?;

        let options: ConversionOptions = serde_json::from_str(&options_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
        })?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ConversionJob {
            id,
            status,
            artifact,
            options,
            cancel_requested,
            failure,
            created_at,
            updated_at,
        })
    }

    const JOB_COLUMNS: &'static str =
        "id, status, artifact, options, cancel_requested, failure, created_at, updated_at";

    fn fetch_job(conn: &rusqlite::Connection, id: &str) -> Result<ConversionJob, JobError> {
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?", Self::JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        job.ok_or_else(|| JobError::NotFound(id.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, input: JobInput) -> Result<ConversionJob, JobError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = JobStatus::Queued;

        let artifact_json =
            serde_json::to_string(&input.artifact).map_err(|e| JobError::Database(e.to_string()))?;
        let options_json =
            serde_json::to_string(&input.options).map_err(|e| JobError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO jobs (id, status, artifact, options, cancel_requested, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
            params![
                id,
                status.as_str(),
                artifact_json,
                options_json,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "INSERT INTO job_progress (job_id, progress, current_stage, last_update) VALUES (?, 0, ?, ?)",
            params![id, status.as_str(), now.to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(ConversionJob {
            id,
            status,
            artifact: input.artifact,
            options: input.options,
            cancel_requested: false,
            failure: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<ConversionJob>, JobError> {
        let conn = self.db.lock();
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?", Self::JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<ConversionJob>, JobError> {
        let conn = self.db.lock();

        let (where_clause, status_param) = match &filter.status {
            Some(status) => ("WHERE status = ?", Some(status.clone())),
            None => ("", None),
        };

        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            Self::JOB_COLUMNS,
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = match status_param {
            Some(status) => {
                stmt.query_map(params![status, filter.limit, filter.offset], Self::row_to_job)?
            }
            None => stmt.query_map(params![filter.limit, filter.offset], Self::row_to_job)?,
        };

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.db.lock();
        let count = match &filter.status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?",
                params![status],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    fn transition(&self, id: &str, next: JobStatus) -> Result<ConversionJob, JobError> {
        let conn = self.db.lock();
        let current = Self::fetch_job(&conn, id)?;

        if !current.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        let now = Utc::now();
        // Guarded write: the row must still hold the status we validated
        // against, otherwise a concurrent transition won the race.
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            params![next.as_str(), now.to_rfc3339(), id, current.status.as_str()],
        )?;
        if changed == 0 {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        Ok(ConversionJob {
            status: next,
            updated_at: now,
            ..current
        })
    }

    fn fail(&self, id: &str, reason: &str) -> Result<ConversionJob, JobError> {
        let conn = self.db.lock();
        let current = Self::fetch_job(&conn, id)?;

        if current.status.is_terminal() {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: JobStatus::Failed.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, failure = ?, updated_at = ? WHERE id = ? AND status = ?",
            params![
                JobStatus::Failed.as_str(),
                reason,
                now.to_rfc3339(),
                id,
                current.status.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: JobStatus::Failed.as_str().to_string(),
            });
        }

        Ok(ConversionJob {
            status: JobStatus::Failed,
            failure: Some(reason.to_string()),
            updated_at: now,
            ..current
        })
    }

    fn update_progress(&self, id: &str, percent: u8, stage: &str) -> Result<(), JobError> {
        if percent > 100 {
            return Err(JobError::InvalidArgument(format!(
                "progress {} is outside [0, 100]",
                percent
            )));
        }

        let conn = self.db.lock();
        let now = Utc::now();

        // Guarded write keeps progress monotonic under concurrent updaters.
        let changed = conn.execute(
            "UPDATE job_progress SET progress = ?, current_stage = ?, last_update = ? WHERE job_id = ? AND progress <= ?",
            params![percent, stage, now.to_rfc3339(), id, percent],
        )?;
        if changed == 1 {
            return Ok(());
        }

        let stored: Option<u8> = conn
            .query_row(
                "SELECT progress FROM job_progress WHERE job_id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            None => Err(JobError::NotFound(id.to_string())),
            Some(stored) => Err(JobError::InvalidArgument(format!(
                "progress may not decrease ({} -> {})",
                stored, percent
            ))),
        }
    }

    fn get_progress(&self, id: &str) -> Result<Option<JobProgress>, JobError> {
        let conn = self.db.lock();
        let progress = conn
            .query_row(
                "SELECT job_id, progress, current_stage, last_update FROM job_progress WHERE job_id = ?",
                params![id],
                |row| {
                    let last_update_str: String = row.get(3)?;
                    Ok(JobProgress {
                        job_id: row.get(0)?,
                        progress: row.get(1)?,
                        current_stage: row.get(2)?,
                        last_update: DateTime::parse_from_rfc3339(&last_update_str)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?;
        Ok(progress)
    }

    fn request_cancel(&self, id: &str) -> Result<ConversionJob, JobError> {
        let conn = self.db.lock();
        let current = Self::fetch_job(&conn, id)?;

        if current.status.is_terminal() {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: "cancelled".to_string(),
            });
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE jobs SET cancel_requested = 1, updated_at = ? WHERE id = ?",
            params![now.to_rfc3339(), id],
        )?;

        Ok(ConversionJob {
            cancel_requested: true,
            updated_at: now,
            ..current
        })
    }

    fn restart(&self, id: &str) -> Result<ConversionJob, JobError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let current = Self::fetch_job(&tx, id)?;
        if current.status != JobStatus::Failed {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: JobStatus::Queued.as_str().to_string(),
            });
        }

        let now = Utc::now();
        tx.execute(
            "UPDATE jobs SET status = ?, failure = NULL, cancel_requested = 0, updated_at = ? WHERE id = ?",
            params![JobStatus::Queued.as_str(), now.to_rfc3339(), id],
        )?;
        tx.execute(
            "UPDATE job_progress SET progress = 0, current_stage = ?, last_update = ? WHERE job_id = ?",
            params![JobStatus::Queued.as_str(), now.to_rfc3339(), id],
        )?;
        tx.commit()?;

        Ok(ConversionJob {
            status: JobStatus::Queued,
            failure: None,
            cancel_requested: false,
            updated_at: now,
            ..current
        })
    }

    fn list_stuck(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ConversionJob>, JobError> {
        let conn = self.db.lock();
        let sql = format!(
            "SELECT {} FROM jobs WHERE status NOT IN ('completed', 'failed') AND updated_at < ? ORDER BY updated_at ASC LIMIT ?",
            Self::JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff.to_rfc3339(), limit], Self::row_to_job)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }
}
