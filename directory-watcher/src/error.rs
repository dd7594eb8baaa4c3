//! Error types for the inbox watcher.

use std::path::PathBuf;

use doc_inbox_extract::ExtractError;
use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Subscription-level failures. Any of these stops the watch loop.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The notification stream ended while the loop was still running.
    #[error("event stream closed unexpectedly for: {0}")]
    StreamClosed(String),

    /// The loop did not stop within the shutdown bound.
    #[error("watch loop did not stop within {0:?}")]
    ShutdownTimeout(std::time::Duration),

    /// The loop task panicked or was aborted.
    #[error("watch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A single file failed to convert. The source file is left in place.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Loading or extracting the source failed.
    #[error("failed to extract text from {}: {source}", path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },

    /// Writing the text output failed.
    #[error("failed to write {} for {}: {source}", output.display(), path.display())]
    Write {
        path: PathBuf,
        output: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    /// The source file the failed conversion was working on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Extract { path, .. } | Self::Write { path, .. } => path,
        }
    }
}
