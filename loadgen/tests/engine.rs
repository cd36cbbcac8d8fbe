use std::time::Duration;

use loadgen::config::LoadTestConfig;
use loadgen::engine::LoadTest;
use loadgen::stage::StageConfig;
use mock_shortener::{MockBehavior, MockServer};
use tokio_util::sync::CancellationToken;

fn config(base_url: String, stages: Vec<StageConfig>) -> LoadTestConfig {
    LoadTestConfig {
        base_url,
        stages,
        inter_iteration_pause: Duration::from_millis(10),
        control_tick: Duration::from_millis(20),
        report_interval: Duration::from_millis(100),
        ..LoadTestConfig::default()
    }
}

#[tokio::test]
async fn short_ramp_runs_to_completion() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let test = LoadTest::new(config(
        server.base_url(),
        vec![
            StageConfig::new(Duration::from_millis(300), 3),
            StageConfig::new(Duration::from_millis(300), 1),
        ],
    ))
    .unwrap();

    let started = std::time::Instant::now();
    let snap = test.run(CancellationToken::new()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(600));

    assert!(snap.iterations > 0);
    // Shutdown waits for in-flight iterations, so none are left half done
    assert_eq!(snap.total_requests, snap.iterations * 3);
    assert_eq!(snap.total_errors, 0);
    assert_eq!(server.state().create_hits() as u64, snap.iterations);
}

#[tokio::test]
async fn cancellation_ends_the_run_early() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let test = LoadTest::new(config(
        server.base_url(),
        vec![StageConfig::new(Duration::from_secs(60), 2)],
    ))
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let snap = tokio::time::timeout(Duration::from_secs(10), test.run(cancel))
        .await
        .expect("cancelled run should finish promptly")
        .unwrap();
    assert!(snap.iterations > 0);
    assert_eq!(snap.total_requests, snap.iterations * 3);
}

#[tokio::test]
async fn abandoned_run_stops_its_users() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let test = LoadTest::new(config(
        server.base_url(),
        vec![StageConfig::new(Duration::from_secs(60), 2)],
    ))
    .unwrap();

    let run = test.run(CancellationToken::new());
    assert!(tokio::time::timeout(Duration::from_millis(200), run).await.is_err());
    assert!(server.state().create_hits() > 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = server.state().create_hits();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.state().create_hits(), settled);
}

#[tokio::test]
async fn misconfigured_stages_fail_before_starting() {
    let server = MockServer::start(MockBehavior::default()).await.unwrap();
    let zero = config(server.base_url(), vec![StageConfig::new(Duration::ZERO, 2)]);
    assert!(LoadTest::new(zero).is_err());

    let negative = config(
        server.base_url(),
        vec![StageConfig::new(Duration::from_secs(1), -3)],
    );
    let err = LoadTest::new(negative).err().unwrap();
    assert!(format!("{err:#}").contains("negative target"));
    assert_eq!(server.state().create_hits(), 0);
}
