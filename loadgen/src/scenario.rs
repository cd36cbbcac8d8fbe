use std::sync::Arc;

use tracing::debug;

use crate::check::CheckEvaluator;
use crate::client::{HttpClient, Outcome, RequestFailure};
use crate::metrics::MetricsAggregator;
use crate::planner::{RequestPlanner, RequestSpec};

/// Everything a virtual user needs to run one iteration. Cheap to clone.
#[derive(Clone)]
pub struct Scenario {
    base_url: Arc<str>,
    client: HttpClient,
    planner: RequestPlanner,
    evaluator: CheckEvaluator,
    metrics: MetricsAggregator,
}

impl Scenario {
    #[must_use]
    pub fn new(
        base_url: &str,
        client: HttpClient,
        planner: RequestPlanner,
        metrics: MetricsAggregator,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.trim_end_matches('/')),
            client,
            planner,
            evaluator: CheckEvaluator::new(metrics.clone()),
            metrics,
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    /// Plans an iteration and issues its requests in order, recording every
    /// outcome. Returns the outcomes in request order.
    pub async fn run_iteration(&self) -> Vec<Outcome> {
        let plan = self.planner.plan_iteration();
        let mut outcomes = Vec::with_capacity(plan.len());
        for spec in &plan {
            let outcome = self.run_request(spec, &outcomes).await;
            self.metrics.record_duration(outcome.elapsed());
            let results = self.evaluator.evaluate(&outcome, &spec.checks);
            self.evaluator.record(&results);
            outcomes.push(outcome);
        }
        self.metrics.record_iteration();
        outcomes
    }

    async fn run_request(&self, spec: &RequestSpec, earlier: &[Outcome]) -> Outcome {
        let uri = format!("{}{}", self.base_url, spec.resolve_path(earlier));
        let body = match spec.body.as_ref().map(serde_json::to_vec).transpose() {
            Ok(body) => body,
            Err(e) => {
                return Outcome::Failed {
                    error: RequestFailure::Other(e.to_string()),
                    elapsed: std::time::Duration::ZERO,
                }
            }
        };
        let outcome = self.client.send(spec.method.clone(), &uri, body).await;
        if let Outcome::Failed { error, .. } = &outcome {
            debug!(request = %spec.label, %uri, %error, "request failed");
        }
        outcome
    }
}
