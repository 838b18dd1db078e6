//! Background marker loading.
//!
//! Loaders run on a worker thread and send completed batches through a
//! bounded channel. The thread that owns the [`ClusterIndex`] drains the
//! channel, so every mutation of the index happens in one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use markercluster_core::{Marker, MarkerEvent};

use crate::ClusterIndex;

/// Default number of batches buffered between a loader and the owner.
pub const DEFAULT_FEED_CAPACITY: usize = 16;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Messages sent from a loader to the owning context.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A completed batch of marker events.
    Batch(Vec<MarkerEvent>),
    /// The loader gave up.
    Failed(String),
    /// The loader delivered everything.
    Finished,
}

/// Where a feed stands after a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// The loader may still send batches.
    Pending,
    /// The loader finished successfully.
    Finished,
    /// The loader failed with the given message.
    Failed(String),
    /// The feed was cancelled.
    Cancelled,
}

impl FeedStatus {
    /// Returns true when no more batches will arrive.
    #[must_use]
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What a drain applied to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    /// Batches received.
    pub batches: usize,
    /// Events applied.
    pub applied: usize,
    /// Events rejected by the index.
    pub rejected: usize,
    /// Feed state after the drain.
    pub status: FeedStatus,
}

/// Loader side of a feed.
#[derive(Debug, Clone)]
pub struct FeedSender {
    tx: SyncSender<FeedMessage>,
    token: CancelToken,
}

impl FeedSender {
    /// Send a batch of events. Returns false if the feed was cancelled or
    /// dropped, in which case the loader should stop.
    pub fn send_events(&self, events: Vec<MarkerEvent>) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.tx.send(FeedMessage::Batch(events)).is_ok()
    }

    /// Send a batch of markers to add.
    pub fn send_markers(&self, markers: Vec<Marker>) -> bool {
        self.send_events(markers.into_iter().map(MarkerEvent::add).collect())
    }

    /// Report a failure. The feed ends after this message.
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.tx.send(FeedMessage::Failed(message.into()));
    }

    /// Report successful completion.
    pub fn finish(&self) {
        let _ = self.tx.send(FeedMessage::Finished);
    }

    /// Cancellation token shared with the owner.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns true once the owner cancelled the feed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owner side of a feed.
#[derive(Debug)]
pub struct MarkerFeed {
    rx: Receiver<FeedMessage>,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
    status: FeedStatus,
}

impl MarkerFeed {
    /// Create a feed and the sender a loader uses to fill it.
    #[must_use]
    pub fn channel(capacity: usize) -> (FeedSender, Self) {
        let (tx, rx) = sync_channel(capacity);
        let token = CancelToken::new();
        let sender = FeedSender {
            tx,
            token: token.clone(),
        };
        let feed = Self {
            rx,
            token,
            handle: None,
            status: FeedStatus::Pending,
        };
        (sender, feed)
    }

    /// Run `loader` on a worker thread.
    ///
    /// The loader reports success or failure through its return value; the
    /// matching terminal message is sent for it.
    #[must_use]
    pub fn spawn<F>(capacity: usize, loader: F) -> Self
    where
        F: FnOnce(&FeedSender) -> Result<(), String> + Send + 'static,
    {
        let (sender, mut feed) = Self::channel(capacity);
        let handle = thread::spawn(move || {
            if sender.is_cancelled() {
                return;
            }
            match loader(&sender) {
                Ok(()) => sender.finish(),
                Err(message) => sender.fail(message),
            }
        });
        feed.handle = Some(handle);
        feed
    }

    /// Cancellation token shared with the loader.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Cancel the feed. Batches not yet applied are discarded.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    /// Apply every batch that is already waiting, without blocking.
    pub fn drain_into(&mut self, index: &mut ClusterIndex) -> FeedReport {
        let mut report = self.empty_report();
        while !self.status.is_done() {
            if self.check_cancelled() {
                break;
            }
            match self.rx.try_recv() {
                Ok(message) => self.handle_message(message, index, &mut report),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.disconnected(),
            }
        }
        report.status = self.status.clone();
        report
    }

    /// Apply batches until the loader finishes, fails, or the feed is
    /// cancelled.
    pub fn wait_into(&mut self, index: &mut ClusterIndex) -> FeedReport {
        const POLL: Duration = Duration::from_millis(50);

        let mut report = self.empty_report();
        while !self.status.is_done() {
            if self.check_cancelled() {
                break;
            }
            match self.rx.recv_timeout(POLL) {
                Ok(message) => self.handle_message(message, index, &mut report),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.disconnected(),
            }
        }
        if self.status != FeedStatus::Cancelled {
            self.join_worker();
        }
        report.status = self.status.clone();
        report
    }

    fn empty_report(&self) -> FeedReport {
        FeedReport {
            batches: 0,
            applied: 0,
            rejected: 0,
            status: self.status.clone(),
        }
    }

    fn check_cancelled(&mut self) -> bool {
        if !self.token.is_cancelled() {
            return false;
        }
        while self.rx.try_recv().is_ok() {}
        self.status = FeedStatus::Cancelled;
        log::debug!("marker feed cancelled");
        true
    }

    fn handle_message(
        &mut self,
        message: FeedMessage,
        index: &mut ClusterIndex,
        report: &mut FeedReport,
    ) {
        match message {
            FeedMessage::Batch(events) => {
                let total = events.len();
                let applied = index.apply_all(events);
                report.batches += 1;
                report.applied += applied;
                report.rejected += total - applied;
            }
            FeedMessage::Failed(message) => {
                index
                    .notifier()
                    .notify(&format!("marker download failed: {message}"));
                self.status = FeedStatus::Failed(message);
            }
            FeedMessage::Finished => self.status = FeedStatus::Finished,
        }
    }

    fn disconnected(&mut self) {
        self.status = FeedStatus::Failed("loader exited without finishing".to_string());
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("marker loader thread panicked");
            }
        }
    }
}

impl Drop for MarkerFeed {
    fn drop(&mut self) {
        if !self.status.is_done() {
            self.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markercluster_core::{ClusteringConfig, MemoryNotifier};

    fn index_with(notifier: Arc<MemoryNotifier>) -> ClusterIndex {
        ClusterIndex::with_notifier(ClusteringConfig::new().with_radius(0.5), notifier).unwrap()
    }

    #[test]
    fn test_spawned_loader_delivers_batches() {
        let mut feed = MarkerFeed::spawn(2, |sender| {
            for batch in 0..4u64 {
                let markers = (0..10)
                    .map(|i| Marker::new(batch * 10 + i, batch as f64 * 10.0, 0.0))
                    .collect();
                if !sender.send_markers(markers) {
                    return Ok(());
                }
            }
            Ok(())
        });

        let mut index = index_with(Arc::new(MemoryNotifier::new()));
        let report = feed.wait_into(&mut index);

        assert_eq!(report.status, FeedStatus::Finished);
        assert_eq!(report.batches, 4);
        assert_eq!(report.applied, 40);
        assert_eq!(index.marker_count(), 40);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_failed_loader_notifies() {
        let notifier = Arc::new(MemoryNotifier::new());
        let mut index = index_with(notifier.clone());
        let mut feed = MarkerFeed::spawn(1, |_| Err("HTTP 503".to_string()));

        let report = feed.wait_into(&mut index);
        assert_eq!(report.status, FeedStatus::Failed("HTTP 503".to_string()));
        assert_eq!(
            notifier.messages(),
            vec!["marker download failed: HTTP 503"]
        );
    }

    #[test]
    fn test_drain_is_non_blocking() {
        let (sender, mut feed) = MarkerFeed::channel(4);
        let mut index = index_with(Arc::new(MemoryNotifier::new()));

        let report = feed.drain_into(&mut index);
        assert_eq!(report.status, FeedStatus::Pending);
        assert_eq!(report.batches, 0);

        assert!(sender.send_markers(vec![Marker::new(1, 0.0, 0.0)]));
        assert!(sender.send_events(vec![MarkerEvent::add(Marker::new(2, 100.0, 0.0))]));
        let report = feed.drain_into(&mut index);
        assert_eq!(report.batches, 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.status, FeedStatus::Pending);

        sender.finish();
        assert_eq!(feed.drain_into(&mut index).status, FeedStatus::Finished);
    }

    #[test]
    fn test_cancel_discards_pending_batches() {
        let (sender, mut feed) = MarkerFeed::channel(4);
        let mut index = index_with(Arc::new(MemoryNotifier::new()));

        assert!(sender.send_markers(vec![Marker::new(1, 0.0, 0.0)]));
        feed.cancel();
        assert!(sender.is_cancelled());
        assert!(!sender.send_markers(vec![Marker::new(2, 0.0, 0.0)]));

        let report = feed.drain_into(&mut index);
        assert_eq!(report.status, FeedStatus::Cancelled);
        assert_eq!(report.batches, 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_dropped_sender_reports_failure() {
        let (sender, mut feed) = MarkerFeed::channel(1);
        drop(sender);
        let mut index = index_with(Arc::new(MemoryNotifier::new()));
        assert!(matches!(
            feed.drain_into(&mut index).status,
            FeedStatus::Failed(_)
        ));
    }
}
