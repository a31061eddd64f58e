//! Word document extraction capability — `pandoc`.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use docmill_core::{Extraction, Extractor, Result};

use super::{collect_files, run_cmd};

/// Capability for Word documents.
///
/// `pandoc` converts the document to plain text on stdout; embedded media is
/// exported under `<output>/images/` via `--extract-media`.
pub struct DocxExtractor;

#[async_trait]
impl Extractor for DocxExtractor {
    fn name(&self) -> &str {
        "DocxExtractor"
    }

    fn extensions(&self) -> &[&str] {
        &[".docx", ".doc"]
    }

    fn mime_types(&self) -> &[&str] {
        &[
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/msword",
        ]
    }

    async fn extract(&self, input: &Path, output_dir: &Path) -> Result<Extraction> {
        let images_dir = output_dir.join("images");
        tokio::fs::create_dir_all(&images_dir).await?;

        let text = run_cmd(
            Command::new("pandoc")
                .arg("--to=plain")
                .arg("--wrap=none")
                .arg(format!("--extract-media={}", images_dir.display()))
                .arg(input),
        )
        .await?;

        let images = collect_files(&images_dir)?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("converter".into(), "pandoc".into());
        metadata.insert("word_count".into(), text.split_whitespace().count().into());
        metadata.insert("line_count".into(), text.lines().count().into());
        metadata.insert("embedded_media_count".into(), images.len().into());

        Ok(Extraction {
            text,
            images,
            metadata,
        })
    }
}
