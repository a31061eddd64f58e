//! Spreadsheet extraction capability — `ssconvert` (gnumeric).

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use docmill_core::{Error, Extraction, Extractor, Result};

use super::{collect_files, run_cmd};

/// Capability for Excel workbooks.
///
/// `ssconvert -S` exports each sheet to its own CSV file in a scratch
/// directory; the sheets are stitched back together as labeled text blocks,
/// mirroring how a reader would scan the workbook sheet by sheet.
pub struct XlsxExtractor;

#[async_trait]
impl Extractor for XlsxExtractor {
    fn name(&self) -> &str {
        "XlsxExtractor"
    }

    fn extensions(&self) -> &[&str] {
        &[".xlsx", ".xls"]
    }

    fn mime_types(&self) -> &[&str] {
        &[
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/vnd.ms-excel",
        ]
    }

    async fn extract(&self, input: &Path, _output_dir: &Path) -> Result<Extraction> {
        let scratch = tempfile::tempdir()?;

        run_cmd(
            Command::new("ssconvert")
                .arg("-S")
                .arg(input)
                .arg(scratch.path().join("sheet%n.csv")),
        )
        .await?;

        let sheets = collect_files(scratch.path())?;
        if sheets.is_empty() {
            return Err(Error::Extraction(format!(
                "No sheets exported from {}",
                input.display()
            )));
        }

        let mut text = String::new();
        let mut row_count = 0usize;
        for (index, sheet) in sheets.iter().enumerate() {
            let csv = tokio::fs::read_to_string(sheet).await?;
            row_count += csv.lines().count();
            text.push_str(&format!("Sheet {}:\n", index + 1));
            text.push_str(&csv);
            if !csv.ends_with('\n') {
                text.push('\n');
            }
            text.push('\n');
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("converter".into(), "ssconvert".into());
        metadata.insert("sheet_count".into(), sheets.len().into());
        metadata.insert("row_count".into(), row_count.into());

        Ok(Extraction {
            text,
            images: Vec::new(),
            metadata,
        })
    }
}
