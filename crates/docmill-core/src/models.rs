//! Core data models for the docmill engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of an extraction job.
///
/// Transitions are monotonic: `Pending → Processing → {Completed, Failed}`.
/// Terminal states are only ever removed by cleanup, never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// True for states no further transition can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A tracked document-extraction job.
///
/// Values handed to callers are owned snapshots of the persisted record, not
/// shared mutable references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub filename: String,
    pub file_size: i64,
    /// File extension including the leading dot (e.g. `.pdf`).
    pub file_type: String,
    pub created_at: DateTime<Utc>,
    /// Set when the job leaves PENDING.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the job reaches a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Per-job output directory; set only on COMPLETED.
    pub output_path: Option<String>,
    pub text_length: Option<i64>,
    pub images_count: Option<i64>,
    pub extractor_used: Option<String>,
    /// Wall-clock processing duration in milliseconds.
    pub processing_ms: Option<i64>,
}

/// Post-completion metrics projected onto the job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetrics {
    pub text_length: i64,
    pub images_count: i64,
    pub extractor_used: String,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    pub total: i64,
}

// =============================================================================
// EXTRACTION TYPES
// =============================================================================

/// Transient output of an extractor capability.
///
/// Produced once per job and consumed by the worker, which projects it onto
/// the job record and the extraction log artifact. Never persisted directly.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Extracted text content.
    pub text: String,
    /// Paths of image files the capability wrote under the job's `images/`
    /// directory.
    pub images: Vec<PathBuf>,
    /// Format-specific metadata (title, author, page count, ...).
    pub metadata: serde_json::Map<String, JsonValue>,
}

/// The `extraction_log.json` artifact written into each completed job's
/// output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionLog {
    pub job_id: Uuid,
    pub filename: String,
    pub extractor_used: String,
    pub extraction_timestamp: DateTime<Utc>,
    pub text_length: i64,
    pub images_count: i64,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_is_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        let parsed: JobStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, JobStatus::Failed);
    }

    #[test]
    fn test_job_round_trips_through_json() {
        let job = Job {
            id: Uuid::new_v4(),
            status: JobStatus::Completed,
            filename: "report.pdf".to_string(),
            file_size: 1200,
            file_type: ".pdf".to_string(),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            error_message: None,
            output_path: Some("/data/outputs/abc".to_string()),
            text_length: Some(4200),
            images_count: Some(3),
            extractor_used: Some("PdfExtractor".to_string()),
            processing_ms: Some(1500),
        };

        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.status, JobStatus::Completed);
        assert_eq!(back.text_length, Some(4200));
    }

    #[test]
    fn test_extraction_default_is_empty() {
        let extraction = Extraction::default();
        assert!(extraction.text.is_empty());
        assert!(extraction.images.is_empty());
        assert!(extraction.metadata.is_empty());
    }

    #[test]
    fn test_extraction_log_field_names() {
        let log = ExtractionLog {
            job_id: Uuid::nil(),
            filename: "report.pdf".to_string(),
            extractor_used: "PdfExtractor".to_string(),
            extraction_timestamp: Utc::now(),
            text_length: 10,
            images_count: 0,
            success: true,
        };

        let json = serde_json::to_value(&log).unwrap();
        for key in [
            "job_id",
            "filename",
            "extractor_used",
            "extraction_timestamp",
            "text_length",
            "images_count",
            "success",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }
}
