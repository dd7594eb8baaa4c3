//! Error types for text extraction.

use thiserror::Error;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors that can occur while registering or running an extractor.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// IO error while loading the source file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The PDF could not be parsed or its text could not be decoded.
    #[error("pdf error: {0}")]
    Pdf(String),

    /// The container archive is unreadable.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An XML part inside a document is malformed.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required part is missing from a document container.
    #[error("document part missing: {0}")]
    MissingPart(String),

    /// Another extractor already handles this extension.
    #[error("extractor already registered for extension: {0}")]
    DuplicateExtension(String),

    /// Extensions must start with a dot and name something after it.
    #[error("invalid extension (expected a leading dot, e.g. \".pdf\"): {0:?}")]
    InvalidExtension(String),
}
