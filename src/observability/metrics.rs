//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters
///
/// All counters use Relaxed atomics; readers see eventually consistent values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    runs_queued: AtomicU64,
    runs_passed: AtomicU64,
    runs_failed: AtomicU64,
    runs_errored: AtomicU64,
    tables_validated: AtomicU64,
    tables_rejected: AtomicU64,
    invocations: AtomicU64,
    invocation_failures: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Runs

    pub fn increment_runs_queued(&self) {
        self.runs_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_passed(&self) {
        self.runs_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_errored(&self) {
        self.runs_errored.fetch_add(1, Ordering::Relaxed);
    }

    // Validation

    pub fn increment_tables_validated(&self) {
        self.tables_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tables_rejected(&self) {
        self.tables_rejected.fetch_add(1, Ordering::Relaxed);
    }

    // Invocations

    pub fn increment_invocations(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invocation_failures(&self) {
        self.invocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_queued: self.runs_queued.load(Ordering::Relaxed),
            runs_passed: self.runs_passed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_errored: self.runs_errored.load(Ordering::Relaxed),
            tables_validated: self.tables_validated.load(Ordering::Relaxed),
            tables_rejected: self.tables_rejected.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            invocation_failures: self.invocation_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_queued: u64,
    pub runs_passed: u64,
    pub runs_failed: u64,
    pub runs_errored: u64,
    pub tables_validated: u64,
    pub tables_rejected: u64,
    pub invocations: u64,
    pub invocation_failures: u64,
}
