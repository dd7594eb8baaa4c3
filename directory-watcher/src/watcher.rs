//! The watch loop: one subscription, one task, one conversion at a time.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::{Result, WatcherError};
use crate::event::{EventBatch, RawEvent};

/// Lifecycle of a watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Opening the subscription.
    Starting,

    /// Waiting for and dispatching events.
    Running,

    /// Cancellation observed; shutting down cleanly.
    Cancelled,

    /// The subscription failed to open or broke while running.
    SubscriptionError,

    /// Terminal. The subscription has been released.
    Stopped,
}

impl WatchState {
    /// Whether the loop has finished.
    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }
}

/// Counters kept by a watch loop over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    /// Events dispatched.
    pub events: usize,

    /// Files converted.
    pub converted: usize,

    /// Created files with no extractor.
    pub unsupported: usize,

    /// Modify/delete events.
    pub ignored: usize,

    /// Conversions that failed.
    pub failed: usize,

    /// Overflow notifications.
    pub overflows: usize,
}

impl WatchReport {
    fn record(&mut self, outcome: &DispatchOutcome) {
        self.events += 1;
        match outcome {
            DispatchOutcome::Converted(_) => self.converted += 1,
            DispatchOutcome::Unsupported => self.unsupported += 1,
            DispatchOutcome::Ignored(_) => self.ignored += 1,
            DispatchOutcome::Overflow => self.overflows += 1,
            DispatchOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for WatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events ({} converted, {} unsupported, {} ignored, {} failed, {} overflows)",
            self.events,
            self.converted,
            self.unsupported,
            self.ignored,
            self.failed,
            self.overflows
        )
    }
}

/// An open, non-recursive notify subscription on one directory.
///
/// Dropping the subscription closes the event channel and unwatches the
/// directory, whichever way the loop exits.
pub struct WatchSubscription {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    events: mpsc::Receiver<notify::Result<Event>>,
}

impl WatchSubscription {
    /// Subscribe to create/modify/delete notifications for the direct
    /// children of `dir`.
    pub fn open(dir: &Path, capacity: usize) -> Result<Self> {
        if !dir.exists() {
            return Err(WatcherError::DirectoryNotFound(dir.display().to_string()));
        }
        if !dir.is_dir() {
            return Err(WatcherError::NotADirectory(dir.display().to_string()));
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if tx.blocking_send(res).is_err() {
                debug!("Watch loop gone, dropping notification");
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!("Subscribed to {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            watcher: Some(watcher),
            events: rx,
        })
    }

    /// A subscription fed by an arbitrary channel instead of the OS.
    #[cfg(test)]
    pub(crate) fn from_receiver(
        dir: impl Into<PathBuf>,
        events: mpsc::Receiver<notify::Result<Event>>,
    ) -> Self {
        Self {
            dir: dir.into(),
            watcher: None,
            events,
        }
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Turn one received notification plus everything already queued into a
    /// batch. A stream error stops the batch; events before it are kept.
    fn collect_batch(
        &mut self,
        first: Option<notify::Result<Event>>,
    ) -> (EventBatch, Option<WatcherError>) {
        let mut batch = EventBatch::new();

        let mut next = match first {
            Some(res) => res,
            None => {
                let err = WatcherError::StreamClosed(self.dir.display().to_string());
                return (batch, Some(err));
            }
        };

        loop {
            match next {
                Ok(event) => batch.push_notify(&event, &self.dir),
                Err(e) => return (batch, Some(e.into())),
            }

            next = match self.events.try_recv() {
                Ok(res) => res,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return (batch, None),
            };
        }
    }
}

impl fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("dir", &self.dir)
            .field("os_watch", &self.watcher.is_some())
            .finish()
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        // Unblock the notify thread before unwatching; it may be parked on a
        // full channel.
        self.events.close();

        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                debug!("Unwatch of {} failed: {e}", self.dir.display());
            }
        }
        debug!("Released subscription for {}", self.dir.display());
    }
}

/// Pulls events from a subscription and hands them to the dispatcher.
#[derive(Debug)]
pub struct WatchLoop {
    dispatcher: Arc<EventDispatcher>,
    state: watch::Sender<WatchState>,
}

impl WatchLoop {
    /// Create a loop in the `Starting` state.
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        let (state, _) = watch::channel(WatchState::Starting);
        Self { dispatcher, state }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    /// Open the subscription on the dispatcher's input directory.
    ///
    /// On failure the loop goes straight to `Stopped` without running.
    pub fn open(&self, capacity: usize) -> Result<WatchSubscription> {
        let dir = self.dispatcher.input_dir();
        WatchSubscription::open(dir, capacity).inspect_err(|e| {
            error!("Cannot watch {}: {e}", dir.display());
            self.state.send_replace(WatchState::SubscriptionError);
            self.state.send_replace(WatchState::Stopped);
        })
    }

    /// Run until `cancel` fires or the subscription breaks.
    ///
    /// Cancellation is observed while waiting for events and between the
    /// events of one batch, never in the middle of a conversion.
    ///
    /// The loop's span is opened here, under the caller's current span.
    pub fn run(
        self,
        subscription: WatchSubscription,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<WatchReport>> {
        let span = info_span!("watch", dir = %subscription.dir().display());
        self.run_inner(subscription, cancel).instrument(span)
    }

    async fn run_inner(
        self,
        mut subscription: WatchSubscription,
        cancel: CancellationToken,
    ) -> Result<WatchReport> {
        self.state.send_replace(WatchState::Running);
        info!("Watching {} for new files", subscription.dir().display());

        let mut report = WatchReport::default();

        let failure = loop {
            let first = tokio::select! {
                biased;
                () = cancel.cancelled() => break None,
                next = subscription.events.recv() => next,
            };

            let (batch, failure) = subscription.collect_batch(first);
            debug!("Woke up with {} events", batch.len());

            for event in batch {
                if cancel.is_cancelled() {
                    debug!("Shutting down, skipping {event}");
                    continue;
                }
                let outcome = self.dispatch(event).await;
                report.record(&outcome);
            }

            if let Some(e) = failure {
                break Some(e);
            }
            if cancel.is_cancelled() {
                break None;
            }
        };

        drop(subscription);

        let result = match failure {
            None => {
                self.state.send_replace(WatchState::Cancelled);
                info!("Watcher cancelled after {report}");
                Ok(report)
            }
            Some(e) => {
                self.state.send_replace(WatchState::SubscriptionError);
                error!("Watcher stopped after {report}: {e}");
                Err(e)
            }
        };

        self.state.send_replace(WatchState::Stopped);
        result
    }

    /// Run one event on the blocking pool and wait for it.
    async fn dispatch(&self, event: RawEvent) -> DispatchOutcome {
        let dispatcher = Arc::clone(&self.dispatcher);
        let span = Span::current();
        let label = event.to_string();

        match tokio::task::spawn_blocking(move || span.in_scope(|| dispatcher.handle(&event))).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Handling {label} aborted: {e}");
                DispatchOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;
    use crate::converter::Converter;
    use doc_inbox_extract::{ExtractorRegistry, Result as ExtractResult};
    use notify::EventKind;
    use notify::event::{CreateKind, Flag, RemoveKind};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    type Tx = mpsc::Sender<notify::Result<Event>>;

    struct Harness {
        _root: TempDir,
        config: WatchConfig,
        watch_loop: WatchLoop,
        /// File names seen by the `.pdf` extractor, in call order.
        handled: Arc<Mutex<Vec<String>>>,
    }

    fn harness() -> Harness {
        let root = TempDir::new().unwrap();
        let config = WatchConfig::new(root.path().join("in"), root.path().join("out"));
        fs::create_dir_all(&config.input_dir).unwrap();
        fs::create_dir_all(&config.output_dir).unwrap();

        let handled = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&handled);
        let registry = ExtractorRegistry::new()
            .with(".pdf", move |path: &Path| -> ExtractResult<String> {
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                seen.lock().unwrap().push(name);
                Ok(fs::read_to_string(path)?.to_uppercase())
            })
            .unwrap()
            .with(".boom", |_: &Path| -> ExtractResult<String> {
                panic!("extractor blew up")
            })
            .unwrap();

        let dispatcher = EventDispatcher::new(Converter::new(Arc::new(registry)), config.clone());
        Harness {
            _root: root,
            config,
            watch_loop: WatchLoop::new(Arc::new(dispatcher)),
            handled,
        }
    }

    fn spawn(h: Harness) -> (Tx, CancellationToken, tokio::task::JoinHandle<Result<WatchReport>>) {
        let (tx, rx) = mpsc::channel(16);
        let subscription = WatchSubscription::from_receiver(&h.config.input_dir, rx);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(h.watch_loop.run(subscription, cancel.clone()));
        (tx, cancel, handle)
    }

    fn created(dir: &Path, name: &str) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(dir.join(name)))
    }

    fn outputs(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_cancel_while_idle_stops_and_releases() {
        let h = harness();
        let mut state = h.watch_loop.subscribe();
        let (tx, cancel, handle) = spawn(h);

        state
            .wait_for(|s| *s == WatchState::Running)
            .await
            .unwrap();
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(report, WatchReport::default());
        assert_eq!(*state.borrow(), WatchState::Stopped);
        assert!(tx.is_closed(), "subscription channel still open");
    }

    #[tokio::test]
    async fn test_events_are_dispatched_in_order() {
        let h = harness();
        let input = h.config.input_dir.clone();
        let output = h.config.output_dir.clone();
        let handled = Arc::clone(&h.handled);
        let (tx, cancel, handle) = spawn(h);

        fs::write(input.join("a.pdf"), "alpha").unwrap();
        fs::write(input.join("b.pdf"), "beta").unwrap();
        fs::write(input.join("c.jpg"), "jpeg").unwrap();

        tx.send(created(&input, "b.pdf")).await.unwrap();
        tx.send(Ok(Event::new(EventKind::Remove(RemoveKind::File)).add_path(input.join("x"))))
            .await
            .unwrap();
        tx.send(Ok(Event::new(EventKind::Any).set_flag(Flag::Rescan)))
            .await
            .unwrap();
        tx.send(created(&input, "c.jpg")).await.unwrap();
        tx.send(created(&input, "a.pdf")).await.unwrap();

        for _ in 0..100 {
            if outputs(&output).len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(
            report,
            WatchReport {
                events: 5,
                converted: 2,
                unsupported: 1,
                ignored: 1,
                failed: 0,
                overflows: 1,
            }
        );
        assert_eq!(*handled.lock().unwrap(), vec!["b.pdf", "a.pdf"]);
        assert!(input.join("c.jpg").exists());
        assert!(!input.join("a.pdf").exists());
        assert!(!input.join("b.pdf").exists());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panicking_extractor_does_not_stop_the_loop() {
        let h = harness();
        let input = h.config.input_dir.clone();
        let output = h.config.output_dir.clone();
        let mut state = h.watch_loop.subscribe();
        let (tx, cancel, handle) = spawn(h);

        fs::write(input.join("bad.boom"), "x").unwrap();
        fs::write(input.join("good.pdf"), "fine").unwrap();
        tx.send(created(&input, "bad.boom")).await.unwrap();
        tx.send(created(&input, "good.pdf")).await.unwrap();

        for _ in 0..100 {
            if !outputs(&output).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(*state.borrow_and_update(), WatchState::Running);

        cancel.cancel();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.converted, 1);
        assert!(input.join("bad.boom").exists());
        assert!(logs_contain("Handling create bad.boom aborted"));
    }

    #[tokio::test]
    async fn test_stream_error_is_a_subscription_error() {
        let h = harness();
        let mut state = h.watch_loop.subscribe();
        let (tx, _cancel, handle) = spawn(h);

        tx.send(Err(notify::Error::generic("inotify read failed")))
            .await
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, WatcherError::Notify(_)), "{err:?}");
        state.wait_for(|s| s.is_stopped()).await.unwrap();
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_closed_stream_is_a_subscription_error() {
        let h = harness();
        let (tx, _cancel, handle) = spawn(h);
        drop(tx);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, WatcherError::StreamClosed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_events_before_a_stream_error_are_still_handled() {
        let h = harness();
        let input = h.config.input_dir.clone();
        let (tx, rx) = mpsc::channel(16);
        fs::write(input.join("a.pdf"), "alpha").unwrap();

        // Queue everything before the loop starts so it arrives as one batch.
        tx.send(created(&input, "a.pdf")).await.unwrap();
        tx.send(Err(notify::Error::generic("queue broke"))).await.unwrap();

        let subscription = WatchSubscription::from_receiver(&input, rx);
        let result = h
            .watch_loop
            .run(subscription, CancellationToken::new())
            .await;

        assert!(result.is_err());
        assert!(!input.join("a.pdf").exists());
        assert_eq!(outputs(&h.config.output_dir).len(), 1);
    }

    #[test]
    fn test_open_missing_directory_fails_start() {
        let h = harness();
        fs::remove_dir(&h.config.input_dir).unwrap();
        let state = h.watch_loop.subscribe();

        let err = h.watch_loop.open(16).unwrap_err();

        assert!(matches!(err, WatcherError::DirectoryNotFound(_)), "{err:?}");
        assert_eq!(*state.borrow(), WatchState::Stopped);
    }

    #[test]
    fn test_open_file_is_not_a_directory() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("inbox");
        fs::write(&file, "").unwrap();

        let err = WatchSubscription::open(&file, 16).unwrap_err();
        assert!(matches!(err, WatcherError::NotADirectory(_)), "{err:?}");
    }

    #[test]
    fn test_report_display() {
        let report = WatchReport {
            events: 3,
            converted: 1,
            unsupported: 1,
            ignored: 1,
            failed: 0,
            overflows: 0,
        };
        assert_eq!(
            report.to_string(),
            "3 events (1 converted, 1 unsupported, 1 ignored, 0 failed, 0 overflows)"
        );
    }
}
