mod common;

use std::time::Duration;

use loadgen::metrics::MetricsAggregator;
use loadgen::scheduler::{Reconcile, VirtualUserScheduler, VuState};
use mock_shortener::{MockBehavior, MockServer};

const PAUSE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn one_tick_starts_every_missing_user() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let metrics = MetricsAggregator::new();
    let mut scheduler =
        VirtualUserScheduler::new(common::scenario(&server.base_url(), &metrics), PAUSE);

    let tick = scheduler.reconcile(5);
    assert_eq!(tick, Reconcile { started: 5, stopping: 0 });
    // Nothing has been polled yet on this single-threaded runtime
    let states = scheduler.states();
    assert_eq!(states.len(), 5);
    assert!(states.iter().all(|(_, s)| *s == VuState::Starting));
    assert_eq!(
        states.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );

    assert!(
        common::wait_until(Duration::from_secs(2), || {
            scheduler.states().iter().all(|(_, s)| *s == VuState::Running)
        })
        .await
    );
    assert_eq!(scheduler.reconcile(5), Reconcile::default());
    assert_eq!(scheduler.active(), 5);

    scheduler.shutdown().await;
    assert!(scheduler.states().is_empty());
}

#[tokio::test]
async fn ramp_down_stops_newest_users_first() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let metrics = MetricsAggregator::new();
    let mut scheduler =
        VirtualUserScheduler::new(common::scenario(&server.base_url(), &metrics), PAUSE);
    scheduler.reconcile(4);

    let tick = scheduler.reconcile(1);
    assert_eq!(tick, Reconcile { started: 0, stopping: 3 });
    assert_eq!(scheduler.active(), 1);
    let states = scheduler.states();
    assert!(states[0].1.is_active());
    assert!(states[1..].iter().all(|(_, s)| !s.is_active()));

    assert!(
        common::wait_until(Duration::from_secs(5), || {
            scheduler.states()[1..]
                .iter()
                .all(|(_, s)| *s == VuState::Stopped)
        })
        .await
    );
    // Stopped users are pruned on the next tick
    assert_eq!(scheduler.reconcile(1), Reconcile::default());
    assert_eq!(scheduler.states().len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn stopping_user_finishes_its_iteration() {
    let server = MockServer::start(MockBehavior {
        latency: Duration::from_millis(150),
        ..MockBehavior::default()
    })
    .await
    .unwrap();
    let metrics = MetricsAggregator::new();
    let mut scheduler =
        VirtualUserScheduler::new(common::scenario(&server.base_url(), &metrics), PAUSE);
    scheduler.reconcile(1);

    // Wait until the first create is in flight, then ramp to zero
    let state = server.state().clone();
    assert!(common::wait_until(Duration::from_secs(2), || state.create_hits() == 1).await);
    assert_eq!(scheduler.reconcile(0), Reconcile { started: 0, stopping: 1 });
    assert_eq!(scheduler.states()[0].1, VuState::Stopping);

    scheduler.shutdown().await;

    assert_eq!(state.create_hits(), 1);
    assert_eq!(state.custom_hits(), 1);
    assert_eq!(state.resolve_hits(), 1);
    let snap = metrics.snapshot();
    assert_eq!(snap.iterations, 1);
    assert_eq!(snap.total_requests, 3);
    // 150ms responses stay under the 500ms threshold
    assert_eq!(snap.total_errors, 0);
}

#[tokio::test]
async fn users_keep_looping_until_stopped() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let metrics = MetricsAggregator::new();
    let mut scheduler = VirtualUserScheduler::new(
        common::scenario(&server.base_url(), &metrics),
        Duration::from_millis(10),
    );
    scheduler.reconcile(2);
    assert!(
        common::wait_until(Duration::from_secs(5), || metrics.snapshot().iterations >= 6).await
    );
    scheduler.shutdown().await;

    let snap = metrics.snapshot();
    assert_eq!(snap.total_requests, snap.iterations * 3);
    assert_eq!(snap.total_errors, 0);
}

#[tokio::test]
async fn dropping_scheduler_stops_users() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let metrics = MetricsAggregator::new();
    let mut scheduler = VirtualUserScheduler::new(
        common::scenario(&server.base_url(), &metrics),
        Duration::from_millis(10),
    );
    scheduler.reconcile(2);
    assert!(
        common::wait_until(Duration::from_secs(5), || metrics.snapshot().iterations >= 2).await
    );
    drop(scheduler);

    // Iterations already in flight still finish
    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = server.state().create_hits();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.state().create_hits(), settled);
    let snap = metrics.snapshot();
    assert_eq!(snap.total_requests, snap.iterations * 3);
}
