//! Markdown extraction capability — native, no external tools.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::warn;

use docmill_core::{Error, Extraction, Extractor, Result};

/// Capability for Markdown and plain-Markdown-family files.
///
/// Reads the file as UTF-8 (lossy), splits YAML front matter into metadata,
/// and records a heading outline plus basic counts. Markdown never embeds
/// image data, so no image files are produced.
pub struct MarkdownExtractor;

/// Split YAML front matter from the body, if present.
///
/// Returns `(front_matter, body)`; an unparseable front matter block is
/// reported as a warning and treated as body text.
fn split_front_matter(content: &str) -> (Option<serde_json::Map<String, JsonValue>>, &str) {
    let Some(rest) = content.strip_prefix("---\n") else {
        return (None, content);
    };
    let Some(end) = rest.find("\n---\n") else {
        return (None, content);
    };

    let yaml = &rest[..end];
    let body = &rest[end + 5..];
    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value) => match serde_json::to_value(value) {
            Ok(JsonValue::Object(map)) => (Some(map), body),
            _ => (None, body),
        },
        Err(e) => {
            warn!(error = %e, "Failed to parse YAML front matter");
            (None, body)
        }
    }
}

/// Collect an indented heading outline (`##` nests one level).
fn heading_outline(content: &str) -> Vec<String> {
    let mut outline = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if level == 0 || level > 6 {
            continue;
        }
        let title = trimmed[level..].trim();
        if !title.is_empty() {
            outline.push(format!("{}{}", "  ".repeat(level - 1), title));
        }
    }
    outline
}

#[async_trait]
impl Extractor for MarkdownExtractor {
    fn name(&self) -> &str {
        "MarkdownExtractor"
    }

    fn extensions(&self) -> &[&str] {
        &[".md", ".markdown", ".mdown", ".mkd"]
    }

    fn mime_types(&self) -> &[&str] {
        &["text/markdown", "text/x-markdown"]
    }

    async fn extract(&self, input: &Path, _output_dir: &Path) -> Result<Extraction> {
        let bytes = tokio::fs::read(input).await?;
        if bytes.is_empty() {
            return Err(Error::Extraction(format!(
                "Markdown file is empty: {}",
                input.display()
            )));
        }
        let content = String::from_utf8_lossy(&bytes).into_owned();

        let (front_matter, body) = split_front_matter(&content);
        let outline = heading_outline(body);

        let mut metadata = serde_json::Map::new();
        metadata.insert("line_count".into(), body.lines().count().into());
        metadata.insert(
            "word_count".into(),
            body.split_whitespace().count().into(),
        );
        metadata.insert("heading_count".into(), outline.len().into());
        if !outline.is_empty() {
            metadata.insert(
                "outline".into(),
                JsonValue::Array(outline.into_iter().map(JsonValue::String).collect()),
            );
        }
        if let Some(front_matter) = front_matter {
            if let Some(title) = front_matter.get("title").and_then(|v| v.as_str()) {
                metadata.insert("title".into(), title.into());
            }
            metadata.insert("front_matter".into(), JsonValue::Object(front_matter));
        }

        Ok(Extraction {
            text: body.to_string(),
            images: Vec::new(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn extract_str(content: &str) -> Extraction {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        tokio::fs::write(&input, content).await.unwrap();
        MarkdownExtractor
            .extract(&input, dir.path())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_plain_markdown() {
        let extraction = extract_str("# Title\n\nSome body text here.\n").await;
        assert!(extraction.text.contains("Some body text"));
        assert!(extraction.images.is_empty());
        assert_eq!(extraction.metadata["heading_count"], 1);
        assert_eq!(extraction.metadata["outline"][0], "Title");
    }

    #[tokio::test]
    async fn test_front_matter_is_lifted_into_metadata() {
        let extraction = extract_str(
            "---\ntitle: Quarterly Report\nauthor: Sam\n---\n# Intro\nbody\n",
        )
        .await;
        assert_eq!(extraction.metadata["title"], "Quarterly Report");
        assert_eq!(extraction.metadata["front_matter"]["author"], "Sam");
        assert!(!extraction.text.contains("author: Sam"));
        assert!(extraction.text.contains("# Intro"));
    }

    #[tokio::test]
    async fn test_nested_heading_outline() {
        let extraction = extract_str("# A\n## B\n### C\nnot # a heading\n").await;
        let outline = extraction.metadata["outline"].as_array().unwrap();
        assert_eq!(outline.len(), 3);
        assert_eq!(outline[1], "  B");
        assert_eq!(outline[2], "    C");
    }

    #[tokio::test]
    async fn test_empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.md");
        tokio::fs::write(&input, b"").await.unwrap();
        let err = MarkdownExtractor
            .extract(&input, dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_unterminated_front_matter_is_body() {
        let extraction = extract_str("---\ntitle: Dangling\nno terminator\n").await;
        assert!(extraction.metadata.get("front_matter").is_none());
        assert!(extraction.text.contains("title: Dangling"));
    }
}
