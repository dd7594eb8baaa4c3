//! Routes raw events to the converter and contains per-file failures.

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::config::WatchConfig;
use crate::converter::{ConversionOutcome, Converter};
use crate::event::{ConversionJob, RawEvent, RawEventKind};

/// What the dispatcher did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Text was written to the given file.
    Converted(PathBuf),

    /// The created file has no extractor.
    Unsupported,

    /// Modify/delete events are only observed.
    Ignored(RawEventKind),

    /// Notifications were lost; nothing to act on.
    Overflow,

    /// Conversion failed; the source was left in place.
    Failed,
}

/// Stateless mapping from raw events to conversion jobs.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    converter: Converter,
    config: WatchConfig,
}

impl EventDispatcher {
    /// Create a dispatcher that converts files from `config.input_dir` into
    /// `config.output_dir`.
    pub fn new(converter: Converter, config: WatchConfig) -> Self {
        Self { converter, config }
    }

    /// The directory event names are relative to.
    pub fn input_dir(&self) -> &Path {
        &self.config.input_dir
    }

    /// Build the conversion job for a file name in the input directory.
    pub fn job_for(&self, name: &Path) -> ConversionJob {
        ConversionJob {
            source: self.config.input_dir.join(name),
            dest: self.config.output_path_for(name),
        }
    }

    /// Handle one event. Never fails: conversion errors are logged here.
    pub fn handle(&self, event: &RawEvent) -> DispatchOutcome {
        match event {
            RawEvent::Overflow => {
                warn!(
                    "Filesystem events were dropped for {}; files created meanwhile will not be converted",
                    self.config.input_dir.display()
                );
                DispatchOutcome::Overflow
            }
            RawEvent::Modified(name) | RawEvent::Deleted(name) => {
                debug!("Event: {} for file: {}", event.kind(), name.display());
                DispatchOutcome::Ignored(event.kind())
            }
            RawEvent::Created(name) => {
                debug!("Event: {} for file: {}", event.kind(), name.display());
                let job = self.job_for(name);

                match self.converter.convert(&job.source, &job.dest) {
                    Ok(ConversionOutcome::Converted { output, .. }) => {
                        DispatchOutcome::Converted(output)
                    }
                    Ok(ConversionOutcome::Unsupported) => DispatchOutcome::Unsupported,
                    Err(e) => {
                        error!(
                            kind = %event.kind(),
                            path = %job.source.display(),
                            "Conversion failed: {e}"
                        );
                        DispatchOutcome::Failed
                    }
                }
            }
        }
    }
}
