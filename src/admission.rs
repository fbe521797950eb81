//! Admission control for concurrent downloads
//!
//! The gate is a counting semaphore with a non-blocking acquire: callers either
//! get a slot immediately or are turned away. There is no waiting queue, which
//! keeps the request path free of suspension points.
//!
//! Slots are handed out as [`DownloadSlot`] guards that give capacity back when
//! dropped, so every exit path of a request (early return, error, panic
//! unwinding) releases exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

/// Bounded counter of free download slots
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    available: AtomicUsize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: AtomicUsize::new(capacity),
        }
    }

    /// Take one slot if any is free. Never blocks.
    ///
    /// Returns `false` without touching the counter when the gate is saturated.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Give one slot back, saturating at the configured capacity.
    pub fn release(&self) {
        let capacity = self.capacity;
        let _ = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < capacity).then_some(current + 1)
            });
    }

    /// Acquire a slot wrapped in a guard that releases it on drop
    pub fn try_acquire_slot(self: &Arc<Self>) -> Option<DownloadSlot> {
        if self.try_acquire() {
            debug!(available = self.available(), "Download slot acquired");
            Some(DownloadSlot {
                gate: Arc::clone(self),
            })
        } else {
            None
        }
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

/// One unit of download capacity, released when dropped
#[derive(Debug)]
#[must_use = "dropping the slot releases it immediately"]
pub struct DownloadSlot {
    gate: Arc<AdmissionGate>,
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        self.gate.release();
        debug!(available = self.gate.available(), "Download slot released");
    }
}
