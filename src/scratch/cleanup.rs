//! Deferred removal of delivered files
//!
//! One background task owns a deadline heap fed through an unbounded channel,
//! so scheduling from the request path is a non-blocking send.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::TempArtifact;
use crate::observability::Metrics;

/// Result of a best-effort removal. Never an error for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    /// The file was already gone, which counts as success
    AlreadyGone,
    /// The filesystem refused; logged and dropped, never retried
    Failed(ErrorKind),
}

/// Remove a file or a whole directory, swallowing every failure
pub async fn remove_quietly(path: &Path) -> CleanupOutcome {
    let removed = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };

    match removed {
        Ok(()) => {
            debug!(path = %path.display(), "Removed scratch entry");
            CleanupOutcome::Removed
        }
        Err(e) if e.kind() == ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch entry, ignoring");
            CleanupOutcome::Failed(e.kind())
        }
    }
}

struct Scheduled {
    due: Instant,
    seq: u64,
    artifact: TempArtifact,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Shared timer facility for artifact removal
pub struct CleanupScheduler {
    tx: mpsc::UnboundedSender<Scheduled>,
    seq: AtomicU64,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl CleanupScheduler {
    /// Start the background task. Must be called inside a Tokio runtime.
    pub fn spawn(metrics: Arc<Metrics>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(run(rx, cancel.clone(), Arc::clone(&pending), metrics));
        tracker.close();

        Self {
            tx,
            seq: AtomicU64::new(0),
            pending,
            cancel,
            tracker,
        }
    }

    pub fn schedule(&self, artifact: TempArtifact, delay: Duration) {
        let entry = Scheduled {
            due: Instant::now() + delay,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            artifact,
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(entry)) = self.tx.send(entry) {
            // Scheduler already stopped; nothing will fire later, so remove now.
            self.pending.fetch_sub(1, Ordering::AcqRel);
            let path = entry.artifact.path;
            warn!(path = %path.display(), "Cleanup scheduler stopped, removing immediately");
            tokio::spawn(async move {
                remove_quietly(&path).await;
            });
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Cancel the timer loop and wait for pending removals to be flushed
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.wait().await;
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Scheduled>,
    cancel: CancellationToken,
    pending: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
) {
    let mut queue: BinaryHeap<Reverse<Scheduled>> = BinaryHeap::new();
    let mut open = true;

    loop {
        if !open && queue.is_empty() {
            return;
        }

        let next_due = queue.peek().map(|Reverse(entry)| entry.due);
        let wait_next = async {
            match next_due {
                Some(due) => sleep_until(due).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv(), if open => match received {
                Some(entry) => queue.push(Reverse(entry)),
                None => open = false,
            },
            _ = wait_next => {
                let now = Instant::now();
                while queue.peek().is_some_and(|Reverse(entry)| entry.due <= now) {
                    if let Some(Reverse(entry)) = queue.pop() {
                        finish(&entry.artifact, &pending, &metrics).await;
                    }
                }
            }
        }
    }

    // Cancelled: flush everything, including entries still in the channel.
    rx.close();
    while let Ok(entry) = rx.try_recv() {
        queue.push(Reverse(entry));
    }
    debug!(remaining = queue.len(), "Cleanup scheduler stopping, flushing pending removals");
    while let Some(Reverse(entry)) = queue.pop() {
        finish(&entry.artifact, &pending, &metrics).await;
    }
}

async fn finish(artifact: &TempArtifact, pending: &AtomicUsize, metrics: &Metrics) {
    match remove_quietly(&artifact.path).await {
        CleanupOutcome::Failed(_) => metrics.cleanup_failed(),
        CleanupOutcome::Removed | CleanupOutcome::AlreadyGone => metrics.cleanup_completed(),
    }
    pending.fetch_sub(1, Ordering::AcqRel);
}
