//! Starting and stopping the watch loop.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use doc_inbox_extract::ExtractorRegistry;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::converter::Converter;
use crate::dispatcher::EventDispatcher;
use crate::error::{Result, WatcherError};
use crate::watcher::{WatchLoop, WatchReport, WatchState};

/// Entry point for running an inbox watcher.
pub struct WatchService;

impl WatchService {
    /// Create the inbox and outbox if needed, subscribe to the inbox, and
    /// spawn the watch loop on the current tokio runtime.
    ///
    /// Fails without spawning anything if the directories cannot be created
    /// or the subscription cannot be opened.
    pub fn start(config: WatchConfig, registry: Arc<ExtractorRegistry>) -> Result<RunningWatcher> {
        config.validate()?;
        fs::create_dir_all(&config.input_dir)?;
        fs::create_dir_all(&config.output_dir)?;

        info!(
            "Starting inbox watcher: {} -> {} (handles {})",
            config.input_dir.display(),
            config.output_dir.display(),
            registry.extensions().join(", ")
        );
        if registry.is_empty() {
            warn!("No extractors registered; every file will be left in the inbox");
        }

        let capacity = config.channel_capacity;
        let dispatcher = EventDispatcher::new(Converter::new(registry), config);
        let watch_loop = WatchLoop::new(Arc::new(dispatcher));
        let state = watch_loop.subscribe();
        let subscription = watch_loop.open(capacity)?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watch_loop.run(subscription, cancel.clone()));

        Ok(RunningWatcher {
            state,
            cancel,
            handle,
        })
    }
}

/// Handle to a spawned watch loop.
#[derive(Debug)]
pub struct RunningWatcher {
    state: watch::Receiver<WatchState>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<WatchReport>>,
}

impl RunningWatcher {
    /// Current state of the loop.
    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Receiver for state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<WatchState> {
        self.state.clone()
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Resolves once the loop reaches `Stopped`, for whatever reason.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        if state.wait_for(|s| s.is_stopped()).await.is_err() {
            debug!("Watch loop exited without publishing its final state");
        }
    }

    /// Cancel the loop and wait for it to finish the event in hand.
    ///
    /// With `Some(limit)`, gives up after `limit` and returns
    /// [`WatcherError::ShutdownTimeout`]; the loop still stops on its own
    /// once the current conversion returns.
    pub async fn shutdown(self, timeout: Option<Duration>) -> Result<WatchReport> {
        self.cancel.cancel();

        match timeout {
            None => self.handle.await?,
            Some(limit) => match tokio::time::timeout(limit, self.handle).await {
                Ok(joined) => joined?,
                Err(_) => {
                    warn!("Watch loop still busy after {limit:?}, not waiting any longer");
                    Err(WatcherError::ShutdownTimeout(limit))
                }
            },
        }
    }

    /// Wait for the loop to stop without cancelling it.
    pub async fn wait(self) -> Result<WatchReport> {
        self.handle.await?
    }
}
