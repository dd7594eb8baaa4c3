//! Extractor registry keyed by file extension.
//!
//! The registry is built once at startup and then shared read-only behind an
//! `Arc`, so lookups need no locking.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::docx::DocxExtractor;
use crate::error::{ExtractError, Result};
use crate::pdf::PdfExtractor;
use crate::text::PlainTextExtractor;

/// Turns a file on disk into plain text for one document format.
pub trait Extractor: Send + Sync {
    /// Extract the text content of the file at `path`.
    fn extract(&self, path: &Path) -> Result<String>;
}

impl<F> Extractor for F
where
    F: Fn(&Path) -> Result<String> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<String> {
        self(path)
    }
}

/// Maps lowercased extensions (leading dot included) to extractors.
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in PDF, DOCX and plain text extractors.
    pub fn with_defaults() -> Self {
        let mut extractors: HashMap<String, Arc<dyn Extractor>> = HashMap::new();

        extractors.insert(".pdf".to_string(), Arc::new(PdfExtractor));
        extractors.insert(".docx".to_string(), Arc::new(DocxExtractor));

        let text: Arc<dyn Extractor> = Arc::new(PlainTextExtractor);
        for ext in PlainTextExtractor::EXTENSIONS {
            extractors.insert((*ext).to_string(), Arc::clone(&text));
        }

        Self { extractors }
    }

    /// Register an extractor for `extension`.
    ///
    /// Fails if the extension is malformed or already taken.
    pub fn register(
        &mut self,
        extension: &str,
        extractor: impl Extractor + 'static,
    ) -> Result<()> {
        let key = normalize_extension(extension)
            .ok_or_else(|| ExtractError::InvalidExtension(extension.to_string()))?;

        if self.extractors.contains_key(&key) {
            return Err(ExtractError::DuplicateExtension(key));
        }

        debug!("Registered extractor for {key}");
        self.extractors.insert(key, Arc::new(extractor));
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, extension: &str, extractor: impl Extractor + 'static) -> Result<Self> {
        self.register(extension, extractor)?;
        Ok(self)
    }

    /// Look up the extractor for `extension` (case-insensitive, e.g. ".PDF").
    pub fn resolve(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        let key = normalize_extension(extension)?;
        self.extractors.get(&key).cloned()
    }

    /// Look up the extractor for a file path by its extension.
    pub fn resolve_path(&self, path: &Path) -> Option<Arc<dyn Extractor>> {
        self.resolve(&dotted_extension(path)?)
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Whether no extractor is registered.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// The extension of `path` with its leading dot, e.g. `report.PDF` -> `.PDF`.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
}

fn normalize_extension(extension: &str) -> Option<String> {
    let rest = extension.strip_prefix('.')?;
    if rest.is_empty() || rest.contains('.') {
        return None;
    }
    Some(extension.to_lowercase())
}
