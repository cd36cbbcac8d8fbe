#![allow(dead_code)]

use std::time::Duration;

use loadgen::client::HttpClient;
use loadgen::metrics::MetricsAggregator;
use loadgen::planner::RequestPlanner;
use loadgen::scenario::Scenario;

pub const THRESHOLD: Duration = Duration::from_millis(500);

pub fn scenario(base_url: &str, metrics: &MetricsAggregator) -> Scenario {
    scenario_with_threshold(base_url, metrics, THRESHOLD)
}

pub fn scenario_with_threshold(
    base_url: &str,
    metrics: &MetricsAggregator,
    threshold: Duration,
) -> Scenario {
    Scenario::new(
        base_url,
        HttpClient::new(Duration::from_secs(5)),
        RequestPlanner::new(threshold),
        metrics.clone(),
    )
}

/// Polls `cond` every 5ms until it holds or `within` runs out.
pub async fn wait_until(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
