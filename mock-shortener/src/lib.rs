//! In-process stand-in for the URL-shortener service.
//!
//! Serves `POST /short-key`, `POST /short-key/custom` and `GET /short-key/:key`
//! over a [`ShortKeyStore`], with knobs to inject failures and latency.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use shortener_util::{
    validate_custom_key, validate_url, CustomShortKeyRequest, ErrorResponse, InsertError,
    ShortKeyRequest, ShortKeyStore,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Resolved keys kept for inspection; later ones are counted but not kept.
pub const MAX_RECORDED_KEYS: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Answer every `POST /short-key` with this status and an error body.
    pub create_status: Option<StatusCode>,
    /// Same for `POST /short-key/custom`.
    pub custom_status: Option<StatusCode>,
    /// Sleep this long before answering any request.
    pub latency: Duration,
    /// Answer creates with 200 and a body that is not JSON.
    pub garbage_body: bool,
    /// Resolve with a 302 to the original URL instead of 200 and the JSON
    /// mapping.
    pub redirect: bool,
}

#[derive(Debug, Default)]
struct Hits {
    create: AtomicUsize,
    custom: AtomicUsize,
    resolve: AtomicUsize,
}

#[derive(Clone)]
pub struct MockState {
    store: ShortKeyStore,
    behavior: Arc<MockBehavior>,
    hits: Arc<Hits>,
    resolved: Arc<Mutex<Vec<String>>>,
}

impl MockState {
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            store: ShortKeyStore::new(),
            behavior: Arc::new(behavior),
            hits: Arc::new(Hits::default()),
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &ShortKeyStore {
        &self.store
    }

    /// Requests that reached `POST /short-key`, counted on arrival.
    #[must_use]
    pub fn create_hits(&self) -> usize {
        self.hits.create.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn custom_hits(&self) -> usize {
        self.hits.custom.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn resolve_hits(&self) -> usize {
        self.hits.resolve.load(Ordering::Acquire)
    }

    /// Keys requested through `GET /short-key/:key`, in arrival order, up to
    /// [`MAX_RECORDED_KEYS`].
    #[must_use]
    pub fn resolved_keys(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }

    async fn delay(&self) {
        if !self.behavior.latency.is_zero() {
            tokio::time::sleep(self.behavior.latency).await;
        }
    }
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/short-key", post(post_short_key))
        .route("/short-key/custom", post(post_short_key_custom))
        .route("/short-key/:key", get(get_short_key))
        .with_state(state)
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(ErrorResponse::new(detail))).into_response()
}

async fn post_short_key(
    State(state): State<MockState>,
    Json(req): Json<ShortKeyRequest>,
) -> Response {
    state.hits.create.fetch_add(1, Ordering::AcqRel);
    state.delay().await;
    if let Some(status) = state.behavior.create_status {
        return error(status, "Injected failure");
    }
    if state.behavior.garbage_body {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }
    if !validate_url(&req.url) {
        return error(StatusCode::BAD_REQUEST, "Invalid URL format");
    }
    match state.store.insert_generated(&req.url) {
        Ok(resp) => Json(resp).into_response(),
        Err(_) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate unique short key",
        ),
    }
}

async fn post_short_key_custom(
    State(state): State<MockState>,
    Json(req): Json<CustomShortKeyRequest>,
) -> Response {
    state.hits.custom.fetch_add(1, Ordering::AcqRel);
    state.delay().await;
    if let Some(status) = state.behavior.custom_status {
        return error(status, "Injected failure");
    }
    if state.behavior.garbage_body {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }
    if !validate_url(&req.url) {
        return error(StatusCode::BAD_REQUEST, "Invalid URL format");
    }
    if !validate_custom_key(&req.custom_key) {
        return error(
            StatusCode::BAD_REQUEST,
            "Custom key can only contain letters, numbers, hyphens, and underscores",
        );
    }
    match state.store.insert_custom(&req.custom_key, &req.url) {
        Ok(resp) => Json(resp).into_response(),
        Err(InsertError::KeyExists) => error(StatusCode::CONFLICT, "Custom key already exists"),
        Err(InsertError::KeySpaceExhausted) => {
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store custom key")
        }
    }
}

async fn get_short_key(State(state): State<MockState>, Path(key): Path<String>) -> Response {
    state.hits.resolve.fetch_add(1, Ordering::AcqRel);
    {
        let mut resolved = state.resolved.lock();
        if resolved.len() < MAX_RECORDED_KEYS {
            resolved.push(key.clone());
        }
    }
    state.delay().await;
    let Some(original_url) = state.store.get(&key) else {
        return error(StatusCode::NOT_FOUND, "Short key not found");
    };
    if state.behavior.redirect {
        return (StatusCode::FOUND, [(header::LOCATION, original_url)]).into_response();
    }
    Json(serde_json::json!({
        "short_key": key,
        "original_url": original_url,
    }))
    .into_response()
}

/// A mock bound to a local port, serving until dropped.
pub struct MockServer {
    addr: SocketAddr,
    state: MockState,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Binds `127.0.0.1:0` and serves in a background task.
    pub async fn start(behavior: MockBehavior) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind mock listener")?;
        let addr = listener.local_addr().context("Failed to read mock address")?;
        let state = MockState::new(behavior);
        let app = router(state.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "mock shortener stopped");
            }
        });
        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[must_use]
    pub fn state(&self) -> &MockState {
        &self.state
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
