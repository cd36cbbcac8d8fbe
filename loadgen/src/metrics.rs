use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::statistics::{CheckTally, LatencyHistogram, MetricsSnapshot};

#[derive(Debug)]
struct Inner {
    started: Instant,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    iterations: AtomicU64,
    durations: Mutex<LatencyHistogram>,
    // Insertion order is the order checks are first seen
    checks: Mutex<Vec<CheckTally>>,
}

/// Run-wide counters shared by every virtual user.
///
/// Cloning hands out another handle to the same counters. Counters are atomics,
/// the histogram and check tallies sit behind locks, and ratios are only ever
/// derived in [`snapshot`](Self::snapshot).
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    inner: Arc<Inner>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                started: Instant::now(),
                total_requests: AtomicU64::new(0),
                total_errors: AtomicU64::new(0),
                iterations: AtomicU64::new(0),
                durations: Mutex::new(LatencyHistogram::new()),
                checks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Records one observed request and how long it took.
    pub fn record_duration(&self, d: Duration) {
        self.inner.durations.lock().record(d);
        self.inner.total_requests.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn increment_error(&self) {
        self.inner.total_errors.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn record_iteration(&self) {
        self.inner.iterations.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_check(&self, name: &str, passed: bool) {
        let mut checks = self.inner.checks.lock();
        let idx = match checks.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                checks.push(CheckTally {
                    name: name.to_string(),
                    passes: 0,
                    fails: 0,
                });
                checks.len() - 1
            }
        };
        let tally = &mut checks[idx];
        if passed {
            tally.passes += 1;
        } else {
            tally.fails += 1;
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.inner.started.elapsed();
        // Errors are always recorded after their request, so reading errors
        // first keeps `total_errors <= total_requests`.
        let total_errors = self.inner.total_errors.load(Ordering::Acquire);
        let total_requests = self.inner.total_requests.load(Ordering::Acquire);
        let iterations = self.inner.iterations.load(Ordering::Acquire);
        let duration = self.inner.durations.lock().percentiles();
        let checks = self.inner.checks.lock().clone();
        let error_rate = if total_requests == 0 {
            0.0
        } else {
            total_errors as f64 / total_requests as f64
        };
        let elapsed_secs = elapsed.as_secs_f64();
        let requests_per_sec = if elapsed_secs > 0.0 {
            total_requests as f64 / elapsed_secs
        } else {
            0.0
        };
        MetricsSnapshot {
            elapsed_secs,
            total_requests,
            total_errors,
            error_rate,
            requests_per_sec,
            iterations,
            duration,
            checks,
        }
    }
}
