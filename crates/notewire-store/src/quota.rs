//! Process-wide storage quota accounting.
//!
//! The tracker holds a single accumulator: the sum of on-disk byte sizes of
//! all *current* note contents. Version history is deliberately excluded —
//! the quota governs current content only.

use std::sync::atomic::{AtomicI64, Ordering};

/// Atomic accumulator of current note bytes, checked against a ceiling.
///
/// `record` is applied exactly once per accepted write or delete, after the
/// durable rename succeeds. Comparisons use strict `>`: usage may sit
/// exactly at the ceiling.
#[derive(Debug)]
pub struct QuotaTracker {
    used: AtomicI64,
    ceiling: i64,
}

impl QuotaTracker {
    /// Create a tracker with the given ceiling and initial usage (from the
    /// startup scan of the notes directory).
    pub fn new(ceiling: i64, initial_used: i64) -> Self {
        Self {
            used: AtomicI64::new(initial_used),
            ceiling,
        }
    }

    /// Current tracked usage in bytes.
    pub fn usage(&self) -> i64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Configured ceiling in bytes.
    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    /// True iff usage strictly exceeds the ceiling. Admission fast path
    /// only; `NoteStore::save` re-checks with the precise delta.
    pub fn is_overloaded(&self) -> bool {
        self.usage() > self.ceiling
    }

    /// Would applying `delta` push usage strictly past the ceiling?
    pub fn would_exceed(&self, delta: i64) -> bool {
        self.usage() + delta > self.ceiling
    }

    /// Apply a size delta to the accumulator.
    pub fn record(&self, delta: i64) {
        self.used.fetch_add(delta, Ordering::Relaxed);
    }
}
