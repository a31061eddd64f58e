//! Result materializer: per-job output artifacts and download packaging.

use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use uuid::Uuid;

use docmill_core::{Error, Extraction, ExtractionLog, Result};

use crate::extractors::collect_files;

/// Artifacts written into every completed job's directory.
const CONTENT_FILE: &str = "content.txt";
const META_FILE: &str = "meta.txt";
const LOG_FILE: &str = "extraction_log.json";

/// Summary of what [`ResultMaterializer::persist`] wrote.
#[derive(Debug, Clone)]
pub struct MaterializedOutput {
    pub output_dir: PathBuf,
    pub text_length: i64,
    pub images_count: i64,
}

/// Writes extraction outputs into an isolated per-job directory and packages
/// them on demand.
///
/// The output tree is partitioned by job id, so concurrent workers never
/// touch the same subtree.
pub struct ResultMaterializer {
    outputs_dir: PathBuf,
}

impl ResultMaterializer {
    /// Create a materializer rooted at `outputs_dir`.
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
        }
    }

    /// Root directory holding all per-job output directories.
    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// The per-job output directory.
    pub fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.outputs_dir.join(job_id.to_string())
    }

    /// Write `content.txt`, `meta.txt`, and `extraction_log.json` for a
    /// successful extraction.
    ///
    /// Image files were already placed under `images/` by the capability;
    /// the count is taken from the directory so the log always matches what
    /// is actually on disk.
    pub async fn persist(
        &self,
        job_id: Uuid,
        filename: &str,
        extractor_name: &str,
        extraction: &Extraction,
    ) -> Result<MaterializedOutput> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(dir.join(CONTENT_FILE), extraction.text.as_bytes()).await?;

        let text_length = extraction.text.chars().count() as i64;
        let images_count = collect_files(&dir.join("images"))?.len() as i64;

        let log = ExtractionLog {
            job_id,
            filename: filename.to_string(),
            extractor_used: extractor_name.to_string(),
            extraction_timestamp: Utc::now(),
            text_length,
            images_count,
            success: true,
        };
        tokio::fs::write(dir.join(LOG_FILE), serde_json::to_vec_pretty(&log)?).await?;

        let meta = render_meta(filename, extractor_name, &log, &extraction.metadata);
        tokio::fs::write(dir.join(META_FILE), meta.as_bytes()).await?;

        debug!(
            %job_id,
            text_length,
            images_count,
            dir = %dir.display(),
            "Materialized job outputs"
        );

        Ok(MaterializedOutput {
            output_dir: dir,
            text_length,
            images_count,
        })
    }

    /// Package the per-job directory into a single `.tar.gz` for download.
    ///
    /// Relative paths are preserved and the archive file itself is excluded.
    /// Repeated requests regenerate the archive deterministically from the
    /// same source directory.
    pub async fn package(&self, job_id: Uuid) -> Result<PathBuf> {
        if !self.exists(job_id).await {
            return Err(Error::JobNotFound(job_id));
        }

        let dir = self.job_dir(job_id);
        let archive_path = dir.join(format!("{job_id}_results.tar.gz"));

        let source = dir.clone();
        let target = archive_path.clone();
        tokio::task::spawn_blocking(move || build_archive(&source, &target))
            .await
            .map_err(|e| Error::Internal(format!("archive task failed: {e}")))??;

        info!(%job_id, archive = %archive_path.display(), "Packaged job results");
        Ok(archive_path)
    }

    /// Whether the job produced any output (non-empty directory).
    pub async fn exists(&self, job_id: Uuid) -> bool {
        let dir = self.job_dir(job_id);
        match tokio::fs::read_dir(&dir).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
            Err(_) => false,
        }
    }

    /// Recursively remove the per-job output directory.
    ///
    /// A missing directory is not an error (jobs that failed before
    /// producing output have nothing to remove).
    pub async fn remove(&self, job_id: Uuid) -> Result<()> {
        match tokio::fs::remove_dir_all(self.job_dir(job_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Render the human-readable `meta.txt` artifact.
fn render_meta(
    filename: &str,
    extractor_name: &str,
    log: &ExtractionLog,
    metadata: &serde_json::Map<String, JsonValue>,
) -> String {
    let mut lines = vec![
        "Document Metadata".to_string(),
        "=================".to_string(),
        String::new(),
        format!("Filename: {filename}"),
        format!("Extractor: {extractor_name}"),
        format!(
            "Extraction Timestamp: {}",
            log.extraction_timestamp.to_rfc3339()
        ),
        format!("Text Length: {} characters", log.text_length),
        format!("Images: {}", log.images_count),
        String::new(),
    ];

    if !metadata.is_empty() {
        lines.push("Properties:".to_string());
        lines.push("-----------".to_string());
        for (key, value) in metadata {
            let rendered = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("{key}: {rendered}"));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Build a gzip-compressed tar of `source` at `target`, excluding `target`
/// itself.
fn build_archive(source: &Path, target: &Path) -> Result<()> {
    let file = std::fs::File::create(target)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let archive_name = target.file_name().map(|n| n.to_os_string());
    for path in collect_files(source)? {
        if path.file_name().map(|n| n.to_os_string()) == archive_name {
            continue;
        }
        let relative = path
            .strip_prefix(source)
            .map_err(|e| Error::Internal(format!("path outside archive root: {e}")))?;
        builder.append_path_with_name(&path, relative)?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_extraction() -> Extraction {
        let mut metadata = serde_json::Map::new();
        metadata.insert("author".into(), "Sam".into());
        metadata.insert("pages".into(), 3.into());
        Extraction {
            text: "hello extracted world".to_string(),
            images: Vec::new(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_persist_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ResultMaterializer::new(dir.path());
        let job_id = Uuid::new_v4();

        let output = materializer
            .persist(job_id, "doc.md", "MarkdownExtractor", &sample_extraction())
            .await
            .unwrap();

        assert_eq!(output.text_length, 21);
        assert_eq!(output.images_count, 0);

        let job_dir = materializer.job_dir(job_id);
        let content = std::fs::read_to_string(job_dir.join("content.txt")).unwrap();
        assert_eq!(content, "hello extracted world");

        let meta = std::fs::read_to_string(job_dir.join("meta.txt")).unwrap();
        assert!(meta.contains("Filename: doc.md"));
        assert!(meta.contains("author: Sam"));
        assert!(meta.contains("pages: 3"));

        let log: ExtractionLog = serde_json::from_slice(
            &std::fs::read(job_dir.join("extraction_log.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(log.job_id, job_id);
        assert_eq!(log.extractor_used, "MarkdownExtractor");
        assert_eq!(log.text_length, 21);
        assert!(log.success);
    }

    #[tokio::test]
    async fn test_persist_counts_images_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ResultMaterializer::new(dir.path());
        let job_id = Uuid::new_v4();

        let images_dir = materializer.job_dir(job_id).join("images");
        std::fs::create_dir_all(&images_dir).unwrap();
        std::fs::write(images_dir.join("img-000.png"), b"png").unwrap();
        std::fs::write(images_dir.join("img-001.png"), b"png").unwrap();

        let output = materializer
            .persist(job_id, "doc.pdf", "PdfExtractor", &sample_extraction())
            .await
            .unwrap();
        assert_eq!(output.images_count, 2);
    }

    #[tokio::test]
    async fn test_exists_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ResultMaterializer::new(dir.path());
        let job_id = Uuid::new_v4();

        assert!(!materializer.exists(job_id).await);

        materializer
            .persist(job_id, "doc.md", "MarkdownExtractor", &sample_extraction())
            .await
            .unwrap();
        assert!(materializer.exists(job_id).await);

        materializer.remove(job_id).await.unwrap();
        assert!(!materializer.exists(job_id).await);

        // Removing again is a no-op.
        materializer.remove(job_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_package_round_trip() {
        use flate2::read::GzDecoder;

        let dir = tempfile::tempdir().unwrap();
        let materializer = ResultMaterializer::new(dir.path());
        let job_id = Uuid::new_v4();

        let images_dir = materializer.job_dir(job_id).join("images");
        std::fs::create_dir_all(&images_dir).unwrap();
        std::fs::write(images_dir.join("img-000.png"), b"fake png bytes").unwrap();
        materializer
            .persist(job_id, "doc.pdf", "PdfExtractor", &sample_extraction())
            .await
            .unwrap();

        let archive_path = materializer.package(job_id).await.unwrap();
        assert!(archive_path.exists());

        let decoder = GzDecoder::new(std::fs::File::open(&archive_path).unwrap());
        let mut archive = tar::Archive::new(decoder);
        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "content.txt".to_string(),
                "extraction_log.json".to_string(),
                "images/img-000.png".to_string(),
                "meta.txt".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_package_is_repeatable_and_excludes_itself() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ResultMaterializer::new(dir.path());
        let job_id = Uuid::new_v4();

        materializer
            .persist(job_id, "doc.md", "MarkdownExtractor", &sample_extraction())
            .await
            .unwrap();

        let first = materializer.package(job_id).await.unwrap();
        let second = materializer.package(job_id).await.unwrap();
        assert_eq!(first, second);

        use flate2::read::GzDecoder;
        let decoder = GzDecoder::new(std::fs::File::open(&second).unwrap());
        let mut archive = tar::Archive::new(decoder);
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            assert!(!name.ends_with(".tar.gz"), "archive contains itself: {name}");
        }
    }

    #[tokio::test]
    async fn test_package_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = ResultMaterializer::new(dir.path());

        let err = materializer.package(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::JobNotFound(_)));
    }
}
