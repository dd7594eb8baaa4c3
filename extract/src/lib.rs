//! # Extractors
//!
//! Pluggable text extraction for doc-inbox. Each supported file extension maps
//! to an [`Extractor`] that turns a file on disk into plain text.
//!
//! ## Built-in formats
//!
//! - **PDF** via `pdf-extract`
//! - **DOCX** via `zip` + `quick-xml`
//! - **Plain text** (`.txt`, `.md`, `.csv`, `.log`) re-encoded as UTF-8
//!
//! ```rust,ignore
//! use doc_inbox_extract::ExtractorRegistry;
//!
//! let registry = ExtractorRegistry::with_defaults();
//! if let Some(extractor) = registry.resolve(".pdf") {
//!     let text = extractor.extract(path)?;
//! }
//! ```

pub mod docx;
pub mod error;
pub mod pdf;
pub mod registry;
pub mod text;

pub use docx::DocxExtractor;
pub use error::{ExtractError, Result};
pub use pdf::PdfExtractor;
pub use registry::{Extractor, ExtractorRegistry, dotted_extension};
pub use text::PlainTextExtractor;
