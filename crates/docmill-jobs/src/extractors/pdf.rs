//! PDF extraction capability — poppler-utils (`pdftotext`, `pdfinfo`,
//! `pdfimages`).

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::warn;

use docmill_core::{Error, Extraction, Extractor, Result};

use super::{collect_files, run_cmd};

/// Capability for PDF files.
///
/// Text comes from `pdftotext`, document metadata from `pdfinfo`, and
/// embedded images are exported as PNG into `<output>/images/` via
/// `pdfimages`. Metadata and image failures degrade gracefully; only a text
/// extraction failure fails the job.
pub struct PdfExtractor;

/// Parse `pdfinfo` output into a metadata map.
fn parse_pdfinfo(output: &str) -> serde_json::Map<String, JsonValue> {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if !value.is_empty() {
                if key == "pages" {
                    if let Ok(pages) = value.parse::<u64>() {
                        metadata.insert(key, JsonValue::Number(pages.into()));
                        continue;
                    }
                }
                metadata.insert(key, JsonValue::String(value.to_string()));
            }
        }
    }

    metadata
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn name(&self) -> &str {
        "PdfExtractor"
    }

    fn extensions(&self) -> &[&str] {
        &[".pdf"]
    }

    fn mime_types(&self) -> &[&str] {
        &["application/pdf"]
    }

    async fn extract(&self, input: &Path, output_dir: &Path) -> Result<Extraction> {
        // Validate PDF magic bytes (%PDF)
        let mut header = [0u8; 4];
        let mut file = tokio::fs::File::open(input).await?;
        if file.read_exact(&mut header).await.is_err() || &header != b"%PDF" {
            return Err(Error::Extraction(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                input.display()
            )));
        }

        // Metadata from pdfinfo; failure degrades to empty metadata.
        let metadata = match run_cmd(Command::new("pdfinfo").arg(input)).await {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(input = %input.display(), error = %e, "pdfinfo failed, continuing without metadata");
                serde_json::Map::new()
            }
        };

        // Text extraction: stdout via the `-` output argument.
        let text = run_cmd(Command::new("pdftotext").arg(input).arg("-")).await?;

        // Embedded images, exported as PNG under images/.
        let images_dir = output_dir.join("images");
        tokio::fs::create_dir_all(&images_dir).await?;
        let images = match run_cmd(
            Command::new("pdfimages")
                .arg("-png")
                .arg(input)
                .arg(images_dir.join("img")),
        )
        .await
        {
            Ok(_) => collect_files(&images_dir)?,
            Err(e) => {
                warn!(input = %input.display(), error = %e, "pdfimages failed, continuing without images");
                Vec::new()
            }
        };

        Ok(Extraction {
            text,
            images,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pdfinfo_keys_and_pages() {
        let output = "Title:          Annual Report\n\
                      Author:         Sam Doe\n\
                      Pages:          12\n\
                      Page size:      612 x 792 pts (letter)\n\
                      Encrypted:      no\n";
        let metadata = parse_pdfinfo(output);

        assert_eq!(metadata["title"], "Annual Report");
        assert_eq!(metadata["author"], "Sam Doe");
        assert_eq!(metadata["pages"], 12);
        assert_eq!(metadata["page_size"], "612 x 792 pts (letter)");
        assert_eq!(metadata["encrypted"], "no");
    }

    #[test]
    fn test_parse_pdfinfo_skips_empty_values() {
        let metadata = parse_pdfinfo("Subject:\nPages: 3\n");
        assert!(metadata.get("subject").is_none());
        assert_eq!(metadata["pages"], 3);
    }

    #[tokio::test]
    async fn test_non_pdf_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fake.pdf");
        tokio::fs::write(&input, b"this is not a pdf").await.unwrap();

        let err = PdfExtractor.extract(&input, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("%PDF"));
    }

    #[tokio::test]
    async fn test_truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tiny.pdf");
        tokio::fs::write(&input, b"%P").await.unwrap();

        let err = PdfExtractor.extract(&input, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("not a valid PDF"));
    }
}
