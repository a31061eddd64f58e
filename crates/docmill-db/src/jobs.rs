//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use docmill_core::{Error, Job, JobMetrics, JobRepository, JobStatus, QueueStats, Result};

/// Columns selected for every full-row read.
const JOB_COLUMNS: &str = "id, status, filename, file_size, file_type, created_at, started_at, \
     completed_at, error_message, output_path, text_length, images_count, extractor_used, \
     processing_ms";

/// SQLite implementation of JobRepository.
///
/// Ids are stored as UUID text (legacy-record compatible), timestamps as
/// chrono `DateTime<Utc>` text. Status transitions are guarded
/// single-statement updates (`WHERE id = ? AND status = ?`), so a lost
/// update on the same job is impossible while different jobs never contend
/// beyond SQLite's writer lock.
#[derive(Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    /// Create a new SqliteJobRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert JobStatus to string for database.
    pub(crate) fn job_status_to_str(status: JobStatus) -> &'static str {
        match status {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Convert string from database to JobStatus.
    fn str_to_job_status(s: &str) -> JobStatus {
        match s {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending, // fallback
        }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: SqliteRow) -> Result<Job> {
        let id: String = row.get("id");
        let status: String = row.get("status");
        Ok(Job {
            id: Uuid::parse_str(&id)
                .map_err(|e| Error::Serialization(format!("invalid job id '{}': {}", id, e)))?,
            status: Self::str_to_job_status(&status),
            filename: row.get("filename"),
            file_size: row.get("file_size"),
            file_type: row.get("file_type"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            error_message: row.get("error_message"),
            output_path: row.get("output_path"),
            text_length: row.get("text_length"),
            images_count: row.get("images_count"),
            extractor_used: row.get("extractor_used"),
            processing_ms: row.get("processing_ms"),
        })
    }

    /// Fetch the current status of a job, if it exists.
    async fn current_status(&self, job_id: Uuid) -> Result<Option<JobStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(status.map(|s| Self::str_to_job_status(&s)))
    }

    /// Map a zero-rows-affected guarded update to the right error.
    async fn transition_error(&self, job_id: Uuid, expected: JobStatus) -> Error {
        match self.current_status(job_id).await {
            Ok(Some(actual)) => Error::Job(format!(
                "job {} is {}, expected {}",
                job_id,
                Self::job_status_to_str(actual),
                Self::job_status_to_str(expected)
            )),
            Ok(None) => Error::JobNotFound(job_id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, filename: &str, file_size: i64, file_type: &str) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO jobs (id, status, filename, file_size, file_type, created_at)
             VALUES (?, 'pending', ?, ?, ?, ?)",
        )
        .bind(job_id.to_string())
        .bind(filename)
        .bind(file_size)
        .bind(file_type)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(job_id)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn list_recent(&self, limit: i64, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?
                     ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(Self::job_status_to_str(status))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn transition_to_processing(&self, job_id: Uuid) -> Result<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE jobs SET status = 'processing', started_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, JobStatus::Pending).await);
        }
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, metrics: JobMetrics, output_path: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let started_at: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT started_at FROM jobs WHERE id = ?")
                .bind(job_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let processing_ms = started_at
            .flatten()
            .map(|started| (now - started).num_milliseconds());

        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'completed', completed_at = ?, output_path = ?,
                 text_length = ?, images_count = ?, extractor_used = ?, processing_ms = ?
             WHERE id = ? AND status = 'processing'",
        )
        .bind(now)
        .bind(output_path)
        .bind(metrics.text_length)
        .bind(metrics.images_count)
        .bind(&metrics.extractor_used)
        .bind(processing_ms)
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, JobStatus::Processing).await);
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error_message: &str) -> Result<()> {
        let now = Utc::now();
        let message = if error_message.trim().is_empty() {
            "extraction failed"
        } else {
            error_message
        };

        let mut tx = self.pool.begin().await?;

        let started_at: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT started_at FROM jobs WHERE id = ?")
                .bind(job_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let processing_ms = started_at
            .flatten()
            .map(|started| (now - started).num_milliseconds());

        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'failed', completed_at = ?, error_message = ?, processing_ms = ?
             WHERE id = ? AND status = 'processing'",
        )
        .bind(now)
        .bind(message)
        .bind(processing_ms)
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, JobStatus::Processing).await);
        }
        Ok(())
    }

    async fn delete_expired(
        &self,
        completed_cutoff: DateTime<Utc>,
        pending_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "DELETE FROM jobs
             WHERE (status = 'completed' AND completed_at < ?)
                OR (status = 'pending' AND created_at < ?)
             RETURNING id",
        )
        .bind(completed_cutoff)
        .bind(pending_cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.get("id");
                Uuid::parse_str(&id)
                    .map_err(|e| Error::Serialization(format!("invalid job id '{}': {}", id, e)))
            })
            .collect()
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let hour_ago = Utc::now() - chrono::Duration::hours(1);

        let row = sqlx::query(
            "SELECT
                SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END) AS pending,
                SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END) AS processing,
                SUM(CASE WHEN status = 'completed' AND completed_at > ? THEN 1 ELSE 0 END)
                    AS completed_last_hour,
                SUM(CASE WHEN status = 'failed' AND completed_at > ? THEN 1 ELSE 0 END)
                    AS failed_last_hour,
                COUNT(*) AS total
             FROM jobs",
        )
        .bind(hour_ago)
        .bind(hour_ago)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
            processing: row.get::<Option<i64>, _>("processing").unwrap_or(0),
            completed_last_hour: row
                .get::<Option<i64>, _>("completed_last_hour")
                .unwrap_or(0),
            failed_last_hour: row.get::<Option<i64>, _>("failed_last_hour").unwrap_or(0),
            total: row.get("total"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_to_str_all_variants() {
        assert_eq!(
            SqliteJobRepository::job_status_to_str(JobStatus::Pending),
            "pending"
        );
        assert_eq!(
            SqliteJobRepository::job_status_to_str(JobStatus::Processing),
            "processing"
        );
        assert_eq!(
            SqliteJobRepository::job_status_to_str(JobStatus::Completed),
            "completed"
        );
        assert_eq!(
            SqliteJobRepository::job_status_to_str(JobStatus::Failed),
            "failed"
        );
    }

    #[test]
    fn test_str_to_job_status_all_variants() {
        assert_eq!(
            SqliteJobRepository::str_to_job_status("pending"),
            JobStatus::Pending
        );
        assert_eq!(
            SqliteJobRepository::str_to_job_status("processing"),
            JobStatus::Processing
        );
        assert_eq!(
            SqliteJobRepository::str_to_job_status("completed"),
            JobStatus::Completed
        );
        assert_eq!(
            SqliteJobRepository::str_to_job_status("failed"),
            JobStatus::Failed
        );
    }

    #[test]
    fn test_str_to_job_status_unknown_fallback() {
        assert_eq!(
            SqliteJobRepository::str_to_job_status("cancelled"),
            JobStatus::Pending
        );
        assert_eq!(SqliteJobRepository::str_to_job_status(""), JobStatus::Pending);
    }

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let s = SqliteJobRepository::job_status_to_str(status);
            assert_eq!(SqliteJobRepository::str_to_job_status(s), status);
        }
    }
}
