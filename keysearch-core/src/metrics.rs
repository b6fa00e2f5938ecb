// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Search progress counters

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters shared by the engine, the dispatcher and every worker
#[derive(Clone)]
pub struct SearchMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Mutex<Instant>,

    // Dispatcher
    batches_dispatched: AtomicU64,
    keys_dispatched: AtomicU64,

    // Workers
    batches_completed: AtomicU64,
    keys_tested: AtomicU64,
    matches: AtomicU64,
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Mutex::new(Instant::now()),
                batches_dispatched: AtomicU64::new(0),
                keys_dispatched: AtomicU64::new(0),
                batches_completed: AtomicU64::new(0),
                keys_tested: AtomicU64::new(0),
                matches: AtomicU64::new(0),
            }),
        }
    }

    /// Restart the clock; called when the search actually begins
    pub fn mark_started(&self) {
        *self.inner.start_time.lock() = Instant::now();
    }

    pub fn record_dispatch(&self, keys: usize) {
        self.inner.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.inner
            .keys_dispatched
            .fetch_add(keys as u64, Ordering::Relaxed);
    }

    /// Record keys tested by a worker; `complete` is false for an abandoned batch
    pub fn record_tested(&self, keys: usize, complete: bool) {
        self.inner.keys_tested.fetch_add(keys as u64, Ordering::Relaxed);
        if complete {
            self.inner.batches_completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_match(&self) {
        self.inner.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batches_dispatched(&self) -> u64 {
        self.inner.batches_dispatched.load(Ordering::Relaxed)
    }

    pub fn keys_dispatched(&self) -> u64 {
        self.inner.keys_dispatched.load(Ordering::Relaxed)
    }

    pub fn batches_completed(&self) -> u64 {
        self.inner.batches_completed.load(Ordering::Relaxed)
    }

    pub fn keys_tested(&self) -> u64 {
        self.inner.keys_tested.load(Ordering::Relaxed)
    }

    pub fn matches(&self) -> u64 {
        self.inner.matches.load(Ordering::Relaxed)
    }

    // Derived metrics
    pub fn elapsed(&self) -> Duration {
        self.inner.start_time.lock().elapsed()
    }

    pub fn keys_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.keys_tested() as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of `total` already tested, in percent
    pub fn percent_of(&self, total: u128) -> f64 {
        if total == 0 {
            return 100.0;
        }
        (self.keys_tested() as f64 / total as f64) * 100.0
    }
}
