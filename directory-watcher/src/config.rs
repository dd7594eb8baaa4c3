//! Configuration for the inbox watcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Where to watch, where to write, and how to shut down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory watched for new files (direct children only).
    pub input_dir: PathBuf,

    /// Directory converted text files are written to.
    pub output_dir: PathBuf,

    /// Extension of output files, without the dot.
    pub output_extension: String,

    /// Capacity of the channel between the notify thread and the loop.
    pub channel_capacity: usize,

    /// Upper bound on waiting for the loop at shutdown (0 = wait forever).
    pub shutdown_timeout_secs: u64,
}

impl WatchConfig {
    /// Create a config for the given inbox and outbox directories.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            output_extension: "txt".to_string(),
            channel_capacity: 1000,
            shutdown_timeout_secs: 30,
        }
    }

    /// Set the output file extension.
    pub fn with_output_extension(mut self, ext: impl Into<String>) -> Self {
        self.output_extension = ext.into();
        self
    }

    /// Set the notification channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the shutdown bound. `None` waits for the loop indefinitely.
    pub fn with_shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout_secs = timeout.map_or(0, |t| t.as_secs().max(1));
        self
    }

    /// Shutdown bound as a duration, if any.
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        (self.shutdown_timeout_secs > 0).then(|| Duration::from_secs(self.shutdown_timeout_secs))
    }

    /// Destination path (before the unique suffix) for an inbox file name.
    pub fn output_path_for(&self, name: &Path) -> PathBuf {
        let stem = name.file_stem().unwrap_or(name.as_os_str());
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(&self.output_extension);
        self.output_dir.join(file_name)
    }

    /// Reject configurations the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.input_dir == self.output_dir {
            return Err(WatcherError::Config(format!(
                "input and output directory are the same: {}",
                self.input_dir.display()
            )));
        }

        let ext = self.output_extension.as_str();
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(WatcherError::Config(format!(
                "invalid output extension: {ext:?}"
            )));
        }

        if self.channel_capacity == 0 {
            return Err(WatcherError::Config(
                "channel capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new("inbox", "outbox")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_watch_config_creation() {
        let config = WatchConfig::new("/data/in", "/data/out")
            .with_output_extension("text")
            .with_channel_capacity(16)
            .with_shutdown_timeout(None);

        assert_eq!(config.input_dir, Path::new("/data/in"));
        assert_eq!(config.output_extension, "text");
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.shutdown_timeout(), None);
    }

    #[test]
    fn test_output_path_strips_source_extension() {
        let config = WatchConfig::new("/in", "/out");

        assert_eq!(
            config.output_path_for(Path::new("report.pdf")),
            Path::new("/out/report.txt")
        );
        assert_eq!(
            config.output_path_for(Path::new("archive.tar.gz")),
            Path::new("/out/archive.tar.txt")
        );
        assert_eq!(
            config.output_path_for(Path::new("README")),
            Path::new("/out/README.txt")
        );
    }

    #[test]
    fn test_validate() {
        assert!(WatchConfig::new("/in", "/out").validate().is_ok());
        assert!(WatchConfig::new("/same", "/same").validate().is_err());
        assert!(
            WatchConfig::new("/in", "/out")
                .with_output_extension(".txt")
                .validate()
                .is_err()
        );
        assert!(
            WatchConfig::new("/in", "/out")
                .with_channel_capacity(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WatchConfig = toml::from_str(
            r#"
            input_dir = "/srv/inbox"
            shutdown_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.input_dir, Path::new("/srv/inbox"));
        assert_eq!(config.output_dir, Path::new("outbox"));
        assert_eq!(config.output_extension, "txt");
        assert_eq!(config.shutdown_timeout(), Some(Duration::from_secs(5)));
    }
}
