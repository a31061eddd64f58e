//! Built-in extractor capabilities.
//!
//! Format parsing stays out of the engine: the PDF and office capabilities
//! shell out to external tools (poppler-utils, pandoc, gnumeric), each
//! invocation guarded by a timeout; Markdown is handled natively.

mod docx;
mod markdown;
mod pdf;
mod xlsx;

pub use docx::DocxExtractor;
pub use markdown::MarkdownExtractor;
pub use pdf::PdfExtractor;
pub use xlsx::XlsxExtractor;

use std::path::{Path, PathBuf};

use tokio::process::Command;

use docmill_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use docmill_core::{Error, Result};

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command with the default extraction timeout.
pub(crate) async fn run_cmd(cmd: &mut Command) -> Result<String> {
    run_cmd_with_timeout(cmd, EXTRACTION_CMD_TIMEOUT_SECS).await
}

/// Collect every regular file under `dir`, recursively, sorted by path.
pub(crate) fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
