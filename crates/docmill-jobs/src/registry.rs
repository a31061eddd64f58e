//! Extractor capability registry for dispatching file processing.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use docmill_core::Extractor;

use crate::extractors::{DocxExtractor, MarkdownExtractor, PdfExtractor, XlsxExtractor};

/// Ordered registry of extractor capabilities.
///
/// Dispatch walks the capabilities in registration order and picks the first
/// whose `can_handle` accepts the file, so earlier registrations win ties.
/// The registry is populated once at startup and shared read-only (`Arc`)
/// afterwards.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create a registry with the built-in capabilities registered.
    pub fn with_default_extractors() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfExtractor));
        registry.register(Arc::new(DocxExtractor));
        registry.register(Arc::new(XlsxExtractor));
        registry.register(Arc::new(MarkdownExtractor));
        registry
    }

    /// Append a capability. Later registrations have lower priority.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        debug!(extractor = extractor.name(), "Registered extractor");
        self.extractors.push(extractor);
    }

    /// Resolve the capability for a file, or `None` if nothing can handle it.
    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .iter()
            .find(|extractor| extractor.can_handle(path))
            .cloned()
    }

    /// All file extensions supported across registered capabilities.
    pub fn supported_extensions(&self) -> BTreeSet<String> {
        self.extractors
            .iter()
            .flat_map(|extractor| extractor.extensions().iter().map(|ext| ext.to_string()))
            .collect()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// True if no capability is registered.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use docmill_core::{Extraction, Result};

    struct FakeExtractor {
        name: &'static str,
        extensions: &'static [&'static str],
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        fn name(&self) -> &str {
            self.name
        }

        fn extensions(&self) -> &[&str] {
            self.extensions
        }

        fn mime_types(&self) -> &[&str] {
            &[]
        }

        async fn extract(&self, _input: &Path, _output_dir: &Path) -> Result<Extraction> {
            Ok(Extraction::default())
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ExtractorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.resolve(Path::new("/tmp/a.pdf")).is_none());
        assert!(registry.supported_extensions().is_empty());
    }

    #[test]
    fn test_registry_resolve_by_extension() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(FakeExtractor {
            name: "A",
            extensions: &[".pdf"],
        }));

        let resolved = registry.resolve(Path::new("/tmp/report.pdf")).unwrap();
        assert_eq!(resolved.name(), "A");
        assert!(registry.resolve(Path::new("/tmp/report.txt")).is_none());
    }

    #[test]
    fn test_registry_registration_order_breaks_ties() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(FakeExtractor {
            name: "first",
            extensions: &[".md"],
        }));
        registry.register(Arc::new(FakeExtractor {
            name: "second",
            extensions: &[".md"],
        }));

        let resolved = registry.resolve(Path::new("/tmp/notes.md")).unwrap();
        assert_eq!(resolved.name(), "first");
    }

    #[test]
    fn test_registry_supported_extensions_aggregates() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(FakeExtractor {
            name: "A",
            extensions: &[".pdf"],
        }));
        registry.register(Arc::new(FakeExtractor {
            name: "B",
            extensions: &[".md", ".markdown"],
        }));

        let extensions = registry.supported_extensions();
        assert_eq!(extensions.len(), 3);
        assert!(extensions.contains(".pdf"));
        assert!(extensions.contains(".md"));
        assert!(extensions.contains(".markdown"));
    }

    #[test]
    fn test_default_extractors_cover_spec_formats() {
        let registry = ExtractorRegistry::with_default_extractors();
        let extensions = registry.supported_extensions();
        for ext in [".pdf", ".docx", ".xlsx", ".md"] {
            assert!(extensions.contains(ext), "missing {ext}");
        }

        assert_eq!(
            registry.resolve(Path::new("/tmp/report.pdf")).unwrap().name(),
            "PdfExtractor"
        );
        assert_eq!(
            registry.resolve(Path::new("/tmp/notes.md")).unwrap().name(),
            "MarkdownExtractor"
        );
    }
}
