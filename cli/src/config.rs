//! On-disk configuration for the `doc-inbox` binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use doc_inbox_watcher::WatchConfig;
use serde::{Deserialize, Serialize};

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Watcher settings (`[watch]` table).
    pub watch: WatchConfig,

    /// Default tracing filter, used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file as TOML: {}", path.display()))
    }

    /// Apply command-line values on top of the loaded file.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(input) = overrides.input {
            self.watch.input_dir = input;
        }
        if let Some(output) = overrides.output {
            self.watch.output_dir = output;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }
}

/// `<config dir>/doc-inbox/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("doc-inbox").join("config.toml"))
}
