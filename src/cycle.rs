//! State shared by everything that runs during one scheduler cycle.

use std::sync::{Mutex, PoisonError};

use chrono::DateTime;
use chrono_tz::Tz;

use crate::ledger::Ledger;

/// The cycle's time snapshot, its ledger and the earliest wake time any
/// component asked for.
#[derive(Debug)]
pub struct CycleContext {
    now: DateTime<Tz>,
    ledger: Ledger,
    next_wake: Mutex<Option<DateTime<Tz>>>,
}

impl CycleContext {
    #[must_use]
    pub fn new(now: DateTime<Tz>) -> Self {
        Self {
            now,
            ledger: Ledger::new(),
            next_wake: Mutex::new(None),
        }
    }

    /// Time the cycle started; every rule and future-program decision of the
    /// cycle is taken against it.
    #[must_use]
    pub fn now(&self) -> DateTime<Tz> {
        self.now
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Records `at` as the next wake time if it is earlier than the current
    /// one. Returns whether it was taken.
    pub fn propose_wake(&self, at: DateTime<Tz>) -> bool {
        let mut next = self.next_wake.lock().unwrap_or_else(PoisonError::into_inner);
        match *next {
            Some(current) if current <= at => false,
            _ => {
                *next = Some(at);
                true
            }
        }
    }

    /// Earliest proposed wake time, if any.
    #[must_use]
    pub fn next_wake(&self) -> Option<DateTime<Tz>> {
        *self.next_wake.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
