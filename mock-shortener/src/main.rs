use anyhow::Context;
use mock_shortener::{router, MockBehavior, MockState};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _g = rt.enter();
    rt.block_on(run_server())
}

async fn run_server() -> anyhow::Result<()> {
    let addr = std::env::var("MOCK_SHORTENER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "mock shortener listening");
    let state = MockState::new(MockBehavior::default());
    axum::serve(listener, router(state))
        .await
        .context("Server failed")
}
