//! Result aggregator implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::executor::JobContext;
use crate::job::JobStatus;
use crate::pipeline::StageOutcome;
use crate::storage::Database;

use super::types::{ConversionReport, ConversionResultRecord};
use super::ReportError;

/// Owns the results collection.
///
/// Writing a result and moving the job into `completed` happen in one
/// transaction: a result row never exists for a job still shown as
/// non-terminal.
pub struct ResultAggregator {
    db: Database,
}

impl ResultAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist the final report and complete the job.
    ///
    /// The job must be in the final pipeline state (`validating`); anything
    /// else is an `InvalidState` error and nothing is written.
    pub fn finalize(
        &self,
        job_id: &str,
        outcomes: &[StageOutcome],
        ctx: &JobContext,
    ) -> Result<String, ReportError> {
        let report = ConversionReport::from_outcomes(outcomes, ctx);
        let output_json = serde_json::to_string(&report)
            .map_err(|e| ReportError::Database(e.to_string()))?;

        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM jobs WHERE id = ?",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(status) = status else {
            return Err(ReportError::JobNotFound(job_id.to_string()));
        };
        if status != JobStatus::Validating.as_str() {
            return Err(ReportError::InvalidState {
                job_id: job_id.to_string(),
                status,
            });
        }

        let result_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        tx.execute(
            "INSERT INTO results (id, job_id, output_data, created_at) VALUES (?, ?, ?, ?)",
            params![result_id, job_id, output_json, now.to_rfc3339()],
        )?;
        let changed = tx.execute(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            params![
                JobStatus::Completed.as_str(),
                now.to_rfc3339(),
                job_id,
                JobStatus::Validating.as_str(),
            ],
        )?;
        if changed != 1 {
            return Err(ReportError::InvalidState {
                job_id: job_id.to_string(),
                status: "concurrently modified".to_string(),
            });
        }
        tx.commit()?;

        info!(
            job_id = %job_id,
            result_id = %result_id,
            success_rate = report.success_rate,
            "Job finalized"
        );

        Ok(result_id)
    }

    /// Fetch the newest result for a job, if it has been finalized.
    pub fn get_for_job(&self, job_id: &str) -> Result<Option<ConversionResultRecord>, ReportError> {
        let conn = self.db.lock();
        let record = conn
            .query_row(
                "SELECT id, job_id, output_data, created_at FROM results WHERE job_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
                params![job_id],
                |row| {
                    let output_json: String = row.get(2)?;
                    let created_at_str: String = row.get(3)?;
                    let output_data: ConversionReport = serde_json::from_str(&output_json)
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;
                    Ok(ConversionResultRecord {
                        id: row.get(0)?,
                        job_id: row.get(1)?,
                        output_data,
                        created_at: DateTime::parse_from_rfc3339(&created_at_str)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
