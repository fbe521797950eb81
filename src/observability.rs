//! Tracing setup and in-process counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honouring `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Metrics handle for recording download outcomes
#[derive(Debug, Default)]
pub struct Metrics {
    downloads_admitted: AtomicU64,
    downloads_rejected_busy: AtomicU64,
    downloads_succeeded: AtomicU64,
    downloads_rejected: AtomicU64,
    downloads_failed: AtomicU64,
    cleanups_completed: AtomicU64,
    cleanups_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_admitted(&self) {
        self.downloads_admitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_admitted", "Metric incremented");
    }

    pub fn download_rejected_busy(&self) {
        self.downloads_rejected_busy.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_rejected_busy", "Metric incremented");
    }

    pub fn download_succeeded(&self) {
        self.downloads_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_succeeded", "Metric incremented");
    }

    pub fn download_rejected(&self) {
        self.downloads_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_rejected", "Metric incremented");
    }

    pub fn download_failed(&self) {
        self.downloads_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_failed", "Metric incremented");
    }

    pub fn cleanup_completed(&self) {
        self.cleanups_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cleanup_failed(&self) {
        self.cleanups_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cleanups_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downloads_admitted: self.downloads_admitted.load(Ordering::Relaxed),
            downloads_rejected_busy: self.downloads_rejected_busy.load(Ordering::Relaxed),
            downloads_succeeded: self.downloads_succeeded.load(Ordering::Relaxed),
            downloads_rejected: self.downloads_rejected.load(Ordering::Relaxed),
            downloads_failed: self.downloads_failed.load(Ordering::Relaxed),
            cleanups_completed: self.cleanups_completed.load(Ordering::Relaxed),
            cleanups_failed: self.cleanups_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub downloads_admitted: u64,
    pub downloads_rejected_busy: u64,
    pub downloads_succeeded: u64,
    pub downloads_rejected: u64,
    pub downloads_failed: u64,
    pub cleanups_completed: u64,
    pub cleanups_failed: u64,
}
