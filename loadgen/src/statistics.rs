use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Bucket width of [`LatencyHistogram`].
pub const BUCKET_WIDTH: Duration = Duration::from_micros(100);
const BUCKETS: usize = 100_000;

/// Fixed-width latency histogram covering 0..10s at 100µs resolution.
///
/// Slower samples land in the last bucket; the exact maximum is kept aside so
/// `max` stays accurate.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    counts: Vec<u64>,
    count: u64,
    sum: Duration,
    min: Duration,
    max: Duration,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: vec![0; BUCKETS],
            count: 0,
            sum: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    pub fn record(&mut self, d: Duration) {
        let idx = (d.as_micros() / BUCKET_WIDTH.as_micros()).min(BUCKETS as u128 - 1) as usize;
        self.counts[idx] += 1;
        self.count += 1;
        self.sum += d;
        self.min = self.min.min(d);
        self.max = self.max.max(d);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.count
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Nearest-rank percentile, rounded down to the bucket floor and clamped
    /// to the observed range.
    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let rank = ((p / 100.0) * (self.count - 1) as f64).round() as u64;
        let mut seen = 0;
        for (idx, n) in self.counts.iter().enumerate() {
            seen += n;
            if seen > rank {
                if idx == BUCKETS - 1 {
                    return Some(self.max);
                }
                let floor = BUCKET_WIDTH * idx as u32;
                return Some(floor.clamp(self.min, self.max));
            }
        }
        Some(self.max)
    }

    #[must_use]
    pub fn percentiles(&self) -> DurationPercentiles {
        if self.count == 0 {
            return DurationPercentiles::default();
        }
        let p = |q| as_millis(self.percentile(q).unwrap_or_default());
        DurationPercentiles {
            min: as_millis(self.min),
            mean: as_millis(self.sum) / self.count as f64,
            p50: p(50.0),
            p90: p(90.0),
            p95: p(95.0),
            p99: p(99.0),
            max: as_millis(self.max),
        }
    }
}

/// Request-duration distribution, all values in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DurationPercentiles {
    pub min: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

#[inline]
fn as_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Point-in-time view of a run's metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub elapsed_secs: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub requests_per_sec: f64,
    pub iterations: u64,
    pub duration: DurationPercentiles,
    pub checks: Vec<CheckTally>,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.duration;
        writeln!(f, "Results after {:.1}s:", self.elapsed_secs)?;
        writeln!(f, "    iterations          = {}", self.iterations)?;
        writeln!(
            f,
            "    requests            = {} ({:.2}/s)",
            self.total_requests, self.requests_per_sec
        )?;
        writeln!(
            f,
            "    errors              = {} ({:.2}%)",
            self.total_errors,
            self.error_rate * 100.0
        )?;
        writeln!(
            f,
            "    req_duration ms     [min, mean, p50, p90, p95, p99, max] = [{:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}]",
            d.min, d.mean, d.p50, d.p90, d.p95, d.p99, d.max
        )?;
        if !self.checks.is_empty() {
            writeln!(f, "    checks:")?;
        }
        for check in &self.checks {
            let total = check.passes + check.fails;
            let pct = if total == 0 {
                0.0
            } else {
                check.passes as f64 * 100.0 / total as f64
            };
            writeln!(
                f,
                "        {:<52} {:>6.2}% ({} / {})",
                check.name, pct, check.passes, total
            )?;
        }
        Ok(())
    }
}
