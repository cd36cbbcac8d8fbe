use std::path::PathBuf;

use anyhow::Context;
use loadgen::config::LoadTestConfig;
use loadgen::engine::{cancel_on_ctrl_c, LoadTest};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => LoadTestConfig::from_file(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => LoadTestConfig::default(),
    }
    .with_env_overrides();
    let test = LoadTest::new(config)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _guard = rt.enter();
    rt.block_on(run_tester(test))
}

async fn run_tester(test: LoadTest) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let snapshot = test.run(cancel).await?;
    println!("{snapshot}");
    Ok(())
}
