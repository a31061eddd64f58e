//! One-time import of legacy flat-file job records.
//!
//! Earlier deployments tracked jobs in a single JSON file keyed by job id.
//! At first startup the store imports that file into the jobs table. The
//! import is idempotent: records whose id already exists are skipped, never
//! overwritten, so re-running it is a no-op.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use docmill_core::Result;

/// Shape of one legacy job record.
///
/// Timestamps are ISO-8601 strings; nullable fields may be `null` or absent.
#[derive(Debug, Deserialize)]
pub struct LegacyJobRecord {
    pub status: String,
    pub filename: String,
    pub file_size: i64,
    pub file_type: String,
    pub created_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Parse an ISO-8601 timestamp, with or without a UTC offset.
///
/// The legacy writer used naive local-less `isoformat()` output; offsets are
/// accepted for forward compatibility.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn valid_status(status: &str) -> bool {
    matches!(status, "pending" | "processing" | "completed" | "failed")
}

/// Import legacy records from `path` into the jobs table.
///
/// Returns the number of newly inserted records. A missing file is a no-op;
/// records that fail to parse are skipped with a warning rather than
/// aborting the import.
pub async fn import_legacy_json(pool: &SqlitePool, path: &Path) -> Result<u64> {
    if !path.exists() {
        info!(
            subsystem = "database",
            component = "legacy_import",
            path = %path.display(),
            "No legacy job file to import"
        );
        return Ok(0);
    }

    let raw = tokio::fs::read_to_string(path).await?;
    let records: HashMap<String, LegacyJobRecord> = serde_json::from_str(&raw)?;

    let mut imported = 0u64;
    for (job_id, record) in records {
        if Uuid::parse_str(&job_id).is_err() {
            warn!(job_id = %job_id, "Skipping legacy record with invalid id");
            continue;
        }
        if !valid_status(&record.status) {
            warn!(
                job_id = %job_id,
                status = %record.status,
                "Skipping legacy record with unknown status"
            );
            continue;
        }

        let created_at = record
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        let started_at = record.started_at.as_deref().and_then(parse_timestamp);
        let completed_at = record.completed_at.as_deref().and_then(parse_timestamp);

        // INSERT OR IGNORE keeps existing records untouched on re-import.
        let result = sqlx::query(
            "INSERT OR IGNORE INTO jobs
                 (id, status, filename, file_size, file_type, created_at, started_at,
                  completed_at, error_message, output_path)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job_id)
        .bind(&record.status)
        .bind(&record.filename)
        .bind(record.file_size)
        .bind(&record.file_type)
        .bind(created_at)
        .bind(started_at)
        .bind(completed_at)
        .bind(&record.error_message)
        .bind(&record.output_path)
        .execute(pool)
        .await?;

        imported += result.rows_affected();
    }

    info!(
        subsystem = "database",
        component = "legacy_import",
        imported,
        path = %path.display(),
        "Imported legacy job records"
    );
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_naive_isoformat() {
        let ts = parse_timestamp("2026-01-15T10:30:00.123456").unwrap();
        assert_eq!(ts.timezone(), Utc);
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2026-01-15T10:30:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T08:30:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_valid_status() {
        for s in ["pending", "processing", "completed", "failed"] {
            assert!(valid_status(s));
        }
        assert!(!valid_status("cancelled"));
        assert!(!valid_status("PENDING"));
    }

    #[test]
    fn test_legacy_record_deserialize_with_absent_fields() {
        let record: LegacyJobRecord = serde_json::from_str(
            r#"{
                "status": "completed",
                "filename": "report.pdf",
                "file_size": 1200,
                "file_type": ".pdf",
                "created_at": "2026-01-15T10:30:00",
                "completed_at": "2026-01-15T10:31:00",
                "output_path": "/data/outputs/x"
            }"#,
        )
        .unwrap();

        assert_eq!(record.filename, "report.pdf");
        assert!(record.started_at.is_none());
        assert!(record.error_message.is_none());
    }
}
