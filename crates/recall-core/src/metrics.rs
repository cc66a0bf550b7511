//! Global atomic counters for memory observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on shutdown or a periodic tick).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations or locking.
pub struct Metrics {
    turns_recorded: AtomicU64,
    sessions_restored: AtomicU64,
    records_skipped: AtomicU64,
    compactions: AtomicU64,
    compaction_failures: AtomicU64,
    context_fallbacks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            turns_recorded: AtomicU64::new(0),
            sessions_restored: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            compaction_failures: AtomicU64::new(0),
            context_fallbacks: AtomicU64::new(0),
        }
    }

    pub fn inc_turns_recorded(&self) {
        self.turns_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "turns_recorded", "counter incremented");
    }

    pub fn inc_sessions_restored(&self) {
        self.sessions_restored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_restored", "counter incremented");
    }

    /// Add `n` malformed ledger records skipped during restoration.
    pub fn add_records_skipped(&self, n: u64) {
        if n > 0 {
            self.records_skipped.fetch_add(n, Ordering::Relaxed);
            tracing::trace!(metric = "records_skipped", n, "counter incremented");
        }
    }

    pub fn inc_compactions(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "compactions", "counter incremented");
    }

    pub fn inc_compaction_failures(&self) {
        self.compaction_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "compaction_failures", "counter incremented");
    }

    pub fn inc_context_fallbacks(&self) {
        self.context_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "context_fallbacks", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            turns_recorded = self.turns_recorded(),
            sessions_restored = self.sessions_restored(),
            records_skipped = self.records_skipped(),
            compactions = self.compactions(),
            compaction_failures = self.compaction_failures(),
            context_fallbacks = self.context_fallbacks(),
        );
    }

    pub fn turns_recorded(&self) -> u64 {
        self.turns_recorded.load(Ordering::Relaxed)
    }

    pub fn sessions_restored(&self) -> u64 {
        self.sessions_restored.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    pub fn compaction_failures(&self) -> u64 {
        self.compaction_failures.load(Ordering::Relaxed)
    }

    pub fn context_fallbacks(&self) -> u64 {
        self.context_fallbacks.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.turns_recorded.store(0, Ordering::Relaxed);
        self.sessions_restored.store(0, Ordering::Relaxed);
        self.records_skipped.store(0, Ordering::Relaxed);
        self.compactions.store(0, Ordering::Relaxed);
        self.compaction_failures.store(0, Ordering::Relaxed);
        self.context_fallbacks.store(0, Ordering::Relaxed);
    }
}
