//! Recording counters.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome counters for the program tasks of one cycle.
///
/// Updated concurrently from every program task.
#[derive(Debug, Default)]
pub struct RecordStats {
    saved: AtomicUsize,
    existing: AtomicUsize,
    too_small: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
}

impl RecordStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recordings written.
    #[must_use]
    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }

    /// Programs skipped because their file already existed.
    #[must_use]
    pub fn existing(&self) -> usize {
        self.existing.load(Ordering::SeqCst)
    }

    /// Recordings discarded for being under the minimum size.
    #[must_use]
    pub fn too_small(&self) -> usize {
        self.too_small.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Segment retry attempts.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Program tasks that have finished, whatever the outcome.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.saved() + self.existing() + self.too_small() + self.failed()
    }

    pub(crate) fn increment_saved(&self) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_existing(&self) {
        self.existing.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_too_small(&self) {
        self.too_small.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}
