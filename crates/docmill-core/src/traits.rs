//! Repository and capability traits.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Extraction, Job, JobMetrics, JobStatus, QueueStats};
use crate::Result;

// =============================================================================
// JOB REPOSITORY
// =============================================================================

/// Persistence contract for job records.
///
/// The store is the single source of truth for job status. Implementations
/// must be safe under concurrent use by multiple workers and the cleanup
/// task; updates to the same job id must be serialized so no write is lost,
/// while operations on different ids proceed independently.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new PENDING job with `created_at = now`.
    ///
    /// Fails only on an underlying storage fault.
    async fn create(&self, filename: &str, file_size: i64, file_type: &str) -> Result<Uuid>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// List jobs newest-created first, optionally filtered by status.
    /// `limit` caps the result count.
    async fn list_recent(&self, limit: i64, status: Option<JobStatus>) -> Result<Vec<Job>>;

    /// Transition PENDING → PROCESSING, recording `started_at`.
    ///
    /// Returns `Error::JobNotFound` for an unknown id and `Error::Job` if the
    /// job is not PENDING.
    async fn transition_to_processing(&self, job_id: Uuid) -> Result<()>;

    /// Transition PROCESSING → COMPLETED, recording metrics, the output
    /// directory, `completed_at`, and the processing duration.
    async fn complete(&self, job_id: Uuid, metrics: JobMetrics, output_path: &str) -> Result<()>;

    /// Transition PROCESSING → FAILED with a human-readable error message.
    /// Never records an output path.
    async fn fail(&self, job_id: Uuid, error_message: &str) -> Result<()>;

    /// Delete expired jobs and return the deleted ids.
    ///
    /// Removes jobs where `(status = COMPLETED AND completed_at <
    /// completed_cutoff) OR (status = PENDING AND created_at <
    /// pending_cutoff)`. The PENDING arm reclaims jobs abandoned before
    /// pickup. Idempotent: an immediate re-run deletes nothing.
    async fn delete_expired(
        &self,
        completed_cutoff: DateTime<Utc>,
        pending_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>>;

    /// Number of jobs currently PENDING.
    async fn pending_count(&self) -> Result<i64>;

    /// Aggregate queue statistics.
    async fn queue_stats(&self) -> Result<QueueStats>;
}

// =============================================================================
// EXTRACTOR CAPABILITY
// =============================================================================

/// A pluggable capability that turns one document format into text, metadata,
/// and images.
///
/// Capabilities are registered once at startup in an ordered registry;
/// dispatch selects the first whose [`can_handle`](Extractor::can_handle)
/// accepts the file.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Tag recorded as `extractor_used` on completed jobs.
    fn name(&self) -> &str;

    /// File extensions this capability accepts, with leading dot, lowercase.
    fn extensions(&self) -> &[&str];

    /// MIME types this capability accepts (matched against sniffed content).
    fn mime_types(&self) -> &[&str];

    /// Whether this capability can process the file: extension match OR
    /// sniffed MIME match.
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = file_extension(path) {
            if self.extensions().contains(&ext.as_str()) {
                return true;
            }
        }
        match infer::get_from_path(path) {
            Ok(Some(kind)) => self.mime_types().contains(&kind.mime_type()),
            _ => false,
        }
    }

    /// Extract content from `input`, writing any image files under
    /// `<output_dir>/images/`.
    async fn extract(&self, input: &Path, output_dir: &Path) -> Result<Extraction>;
}

/// Lowercased file extension with leading dot (`".pdf"`), if any.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TextOnly;

    #[async_trait]
    impl Extractor for TextOnly {
        fn name(&self) -> &str {
            "TextOnly"
        }

        fn extensions(&self) -> &[&str] {
            &[".txt", ".md"]
        }

        fn mime_types(&self) -> &[&str] {
            &["text/plain"]
        }

        async fn extract(&self, _input: &Path, _output_dir: &Path) -> Result<Extraction> {
            Ok(Extraction::default())
        }
    }

    #[test]
    fn test_file_extension_lowercases() {
        assert_eq!(
            file_extension(Path::new("/tmp/Report.PDF")),
            Some(".pdf".to_string())
        );
        assert_eq!(file_extension(Path::new("/tmp/no_extension")), None);
    }

    #[test]
    fn test_can_handle_by_extension() {
        let extractor = TextOnly;
        // Nonexistent path: sniffing fails, extension match still applies.
        assert!(extractor.can_handle(Path::new("/nonexistent/notes.md")));
        assert!(!extractor.can_handle(Path::new("/nonexistent/photo.png")));
    }

    #[test]
    fn test_can_handle_case_insensitive_extension() {
        let extractor = TextOnly;
        assert!(extractor.can_handle(Path::new("/nonexistent/NOTES.TXT")));
    }
}
