use anyhow::Context;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::HttpClient;
use crate::config::LoadTestConfig;
use crate::metrics::MetricsAggregator;
use crate::planner::RequestPlanner;
use crate::scenario::Scenario;
use crate::scheduler::VirtualUserScheduler;
use crate::stage::StageController;
use crate::statistics::MetricsSnapshot;

/// One validated load test, ready to run.
pub struct LoadTest {
    config: LoadTestConfig,
    stages: StageController,
}

impl LoadTest {
    /// Validates `config`; nothing is started if it is unusable.
    pub fn new(config: LoadTestConfig) -> anyhow::Result<Self> {
        let stages = config.validate().context("Invalid load test config")?;
        Ok(Self { config, stages })
    }

    #[must_use]
    pub fn stages(&self) -> &StageController {
        &self.stages
    }

    /// Drives the ramp until the last stage ends or `cancel` fires, then stops
    /// every virtual user and returns the final snapshot.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<MetricsSnapshot> {
        let metrics = MetricsAggregator::new();
        let scenario = Scenario::new(
            self.config.trimmed_base_url(),
            HttpClient::new(self.config.request_timeout),
            RequestPlanner::new(self.config.latency_threshold),
            metrics.clone(),
        );
        let mut scheduler = VirtualUserScheduler::new(scenario, self.config.inter_iteration_pause);

        info!(
            base_url = %self.config.trimmed_base_url(),
            stages = self.stages.stages().len(),
            total = ?self.stages.total_duration(),
            max_vus = self.stages.max_target(),
            "load test starting"
        );

        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.config.control_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_report = start;
        let mut current_stage = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => {
                    warn!("load test cancelled, stopping virtual users");
                    break;
                }
            }
            let elapsed = start.elapsed();
            let Some(target) = self.stages.target_at(elapsed) else {
                info!(elapsed = ?elapsed, "final stage complete");
                break;
            };
            let stage = self.stages.stage_index_at(elapsed);
            if stage != current_stage {
                info!(stage = ?stage, target, "entering stage");
                current_stage = stage;
            }
            scheduler.reconcile(target);
            if last_report.elapsed() >= self.config.report_interval {
                last_report = Instant::now();
                log_snapshot(&metrics.snapshot(), scheduler.active());
            }
        }

        scheduler.shutdown().await;
        let snapshot = metrics.snapshot();
        info!(
            total_requests = snapshot.total_requests,
            total_errors = snapshot.total_errors,
            error_rate = snapshot.error_rate,
            iterations = snapshot.iterations,
            "load test finished"
        );
        Ok(snapshot)
    }
}

fn log_snapshot(snapshot: &MetricsSnapshot, active: usize) {
    info!(
        vus = active,
        requests = snapshot.total_requests,
        errors = snapshot.total_errors,
        error_rate = format_args!("{:.4}", snapshot.error_rate),
        rps = format_args!("{:.1}", snapshot.requests_per_sec),
        p95_ms = format_args!("{:.2}", snapshot.duration.p95),
        "progress"
    );
}

/// Completes the run early when the process receives ctrl-c.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}
