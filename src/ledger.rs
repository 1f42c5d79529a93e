//! Per-cycle record of programs already claimed for download.

use std::sync::{Mutex, PoisonError};

use crate::program::Program;

/// A claimed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub station_id: String,
    pub title: String,
    pub start: String,
}

impl LedgerEntry {
    #[must_use]
    pub fn new(
        station_id: impl Into<String>,
        title: impl Into<String>,
        start: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            title: title.into(),
            start: start.into(),
        }
    }

    /// Entry for `program`.
    #[must_use]
    pub fn for_program(program: &Program) -> Self {
        Self::new(&program.station_id, &program.title, &program.start)
    }

    /// Whether `self` and `other` name the same recording.
    ///
    /// Same title on another station counts: simulcasts are recorded once.
    fn collides_with(&self, other: &Self) -> bool {
        if self.title != other.title {
            return false;
        }
        self.station_id != other.station_id || self.start == other.start
    }
}

/// Append-only ledger shared by every program task of one cycle.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `entry` collides with a recorded entry.
    #[must_use]
    pub fn is_duplicate(&self, entry: &LedgerEntry) -> bool {
        self.lock().iter().any(|e| e.collides_with(entry))
    }

    /// Appends `entry` unconditionally.
    pub fn record(&self, entry: LedgerEntry) {
        self.lock().push(entry);
    }

    /// Checks and records in one critical section.
    ///
    /// Returns `false` (recording nothing) if `entry` is a duplicate.
    pub fn claim(&self, entry: LedgerEntry) -> bool {
        let mut entries = self.lock();
        if entries.iter().any(|e| e.collides_with(&entry)) {
            return false;
        }
        entries.push(entry);
        true
    }

    #[must_use]
    pub fn contains(&self, entry: &LedgerEntry) -> bool {
        self.lock().contains(entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LedgerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
