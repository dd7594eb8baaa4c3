//! Single-file conversion: extract, write, then remove the source.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use doc_inbox_extract::{ExtractorRegistry, dotted_extension};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ConversionError;

/// Result of a conversion that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Text was written to `output`.
    Converted {
        /// The file that was written.
        output: PathBuf,
        /// Whether the source file was removed afterwards.
        source_removed: bool,
    },

    /// No extractor handles this file type; nothing was touched.
    Unsupported,
}

/// Converts inbox files to text using an extractor registry.
#[derive(Debug, Clone)]
pub struct Converter {
    registry: Arc<ExtractorRegistry>,
}

impl Converter {
    /// Create a converter backed by `registry`.
    pub fn new(registry: Arc<ExtractorRegistry>) -> Self {
        Self { registry }
    }

    /// Convert `source` to text and write it next to `dest` under a unique name.
    ///
    /// `dest` names the intended output (e.g. `out/report.txt`); the file
    /// actually written is `out/report_<uuid>.txt`. The source is removed only
    /// after the output has been fully written.
    pub fn convert(&self, source: &Path, dest: &Path) -> Result<ConversionOutcome, ConversionError> {
        let Some(extractor) = self.registry.resolve_path(source) else {
            debug!(
                "unsupported file type {}: {}",
                dotted_extension(source).as_deref().unwrap_or("(none)"),
                source.display()
            );
            return Ok(ConversionOutcome::Unsupported);
        };

        let text = extractor
            .extract(source)
            .map_err(|e| ConversionError::Extract {
                path: source.to_path_buf(),
                source: e,
            })?;

        let output = unique_destination(dest);
        write_atomically(&output, &text).map_err(|e| ConversionError::Write {
            path: source.to_path_buf(),
            output: output.clone(),
            source: e,
        })?;

        info!(
            "Converted {} -> {} ({} chars)",
            source.display(),
            output.display(),
            text.chars().count()
        );

        let source_removed = match fs::remove_file(source) {
            Ok(()) => true,
            Err(e) => {
                warn!("Converted but could not remove {}: {e}", source.display());
                false
            }
        };

        Ok(ConversionOutcome::Converted {
            output,
            source_removed,
        })
    }
}

/// Insert a fresh `_<uuid>` before the extension of `dest`.
pub fn unique_destination(dest: &Path) -> PathBuf {
    let stem = dest.file_stem().unwrap_or_default();

    let mut file_name = stem.to_os_string();
    file_name.push("_");
    file_name.push(Uuid::new_v4().to_string());
    if let Some(ext) = dest.extension() {
        file_name.push(".");
        file_name.push(ext);
    }

    dest.with_file_name(file_name)
}

/// Write `text` to a temporary sibling, then rename it over `path`.
fn write_atomically(path: &Path, text: &str) -> std::io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = fs::write(&temp_path, text).and_then(|()| fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
