//! # Inbox Watcher
//!
//! This crate watches a single inbox directory and turns every new document
//! dropped into it into a UTF-8 text file in an outbox directory. The source
//! file is removed once its text has been written.
//!
//! ## Features
//!
//! - **Non-recursive watching**: only direct children of the inbox are seen
//! - **Extension dispatch**: extractors are looked up by file extension
//! - **Unique outputs**: `report.pdf` becomes `report_<uuid>.txt`
//! - **Failure containment**: a bad file is logged and left in place
//! - **Cooperative shutdown**: cancellation never interrupts a conversion
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Inbox Watcher                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchService ──► WatchLoop ──► EventDispatcher ──► Converter   │
//! │       │               │               │                │        │
//! │       ▼               ▼               ▼                ▼        │
//! │  RunningWatcher  WatchSubscription  RawEvent  ExtractorRegistry │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod service;
pub mod watcher;

pub use config::WatchConfig;
pub use converter::{ConversionOutcome, Converter};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use error::{ConversionError, Result, WatcherError};
pub use event::{ConversionJob, EventBatch, RawEvent, RawEventKind};
pub use service::{RunningWatcher, WatchService};
pub use watcher::{WatchLoop, WatchReport, WatchState, WatchSubscription};
