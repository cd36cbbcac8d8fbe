use std::time::Duration;

use crate::client::{HttpResponse, Outcome};
use crate::metrics::MetricsAggregator;

/// A predicate over one request outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    StatusIn(Vec<u16>),
    /// Wall-clock time from issuing the request to the last body byte,
    /// including pool checkout and connection setup.
    LatencyUnder(Duration),
    /// The body parses as a JSON object that has this key. Bodies are capped
    /// at [`MAX_BODY_BYTES`](crate::client::MAX_BODY_BYTES).
    BodyHasKey(String),
}

impl Check {
    /// Transport failures fail every kind of check.
    #[must_use]
    pub fn evaluate(&self, outcome: &Outcome) -> bool {
        let Some(resp) = outcome.response() else {
            return false;
        };
        match self {
            Check::StatusIn(statuses) => statuses.contains(&resp.status),
            Check::LatencyUnder(limit) => resp.latency < *limit,
            Check::BodyHasKey(key) => body_has_key(resp, key),
        }
    }
}

fn body_has_key(resp: &HttpResponse, key: &str) -> bool {
    serde_json::from_slice::<serde_json::Value>(&resp.body)
        .ok()
        .and_then(|v| v.as_object().map(|o| o.contains_key(key)))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCheck {
    pub name: String,
    pub check: Check,
}

impl NamedCheck {
    #[must_use]
    pub fn new(name: impl Into<String>, check: Check) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

/// Runs check groups and folds their results into the run metrics.
#[derive(Debug, Clone)]
pub struct CheckEvaluator {
    metrics: MetricsAggregator,
}

impl CheckEvaluator {
    #[must_use]
    pub fn new(metrics: MetricsAggregator) -> Self {
        Self { metrics }
    }

    #[must_use]
    pub fn evaluate(&self, outcome: &Outcome, checks: &[NamedCheck]) -> Vec<CheckResult> {
        checks
            .iter()
            .map(|c| CheckResult {
                name: c.name.clone(),
                passed: c.check.evaluate(outcome),
            })
            .collect()
    }

    /// Tallies every result and counts at most one error for the group.
    pub fn record(&self, results: &[CheckResult]) {
        let mut failed = false;
        for result in results {
            self.metrics.record_check(&result.name, result.passed);
            failed |= !result.passed;
        }
        if failed {
            self.metrics.increment_error();
        }
    }
}
