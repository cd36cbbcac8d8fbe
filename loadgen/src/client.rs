use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shortener_util::drain::DrainBodyFuture;
use shortener_util::{byte_body, empty_body};

/// Bodies beyond this are cut off, so a body check on a larger document sees
/// truncated JSON and fails.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub latency: Duration,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestFailure {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// What came back from one request: a response of any status, or nothing.
#[derive(Debug, Clone)]
pub enum Outcome {
    Response(HttpResponse),
    Failed {
        error: RequestFailure,
        elapsed: Duration,
    },
}

impl Outcome {
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Outcome::Response(resp) => resp.latency,
            Outcome::Failed { elapsed, .. } => *elapsed,
        }
    }

    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Outcome::Response(resp) => Some(resp),
            Outcome::Failed { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpClient {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    /// Sends one JSON request and drains the response. Never returns an error:
    /// transport problems come back as [`Outcome::Failed`].
    pub async fn send(&self, method: Method, uri: &str, body: Option<Vec<u8>>) -> Outcome {
        let start = Instant::now();
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(body.map_or_else(empty_body, byte_body));
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                return Outcome::Failed {
                    error: RequestFailure::Other(e.to_string()),
                    elapsed: start.elapsed(),
                }
            }
        };
        match tokio::time::timeout(self.timeout, self.send_recv(request)).await {
            Ok(Ok((status, body))) => Outcome::Response(HttpResponse {
                status,
                latency: start.elapsed(),
                body,
            }),
            Ok(Err(error)) => Outcome::Failed {
                error,
                elapsed: start.elapsed(),
            },
            Err(_) => Outcome::Failed {
                error: RequestFailure::Timeout(self.timeout),
                elapsed: start.elapsed(),
            },
        }
    }

    async fn send_recv(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<(u16, Vec<u8>), RequestFailure> {
        let resp = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                RequestFailure::Connect(e.to_string())
            } else {
                RequestFailure::Other(e.to_string())
            }
        })?;
        let status = resp.status().as_u16();
        let content_length: usize = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|hv| hv.parse().ok())
            .unwrap_or(1024);
        let bytes = DrainBodyFuture::new(resp.into_body(), content_length, MAX_BODY_BYTES)
            .await
            .map_err(|e| RequestFailure::Other(e.to_string()))?;
        Ok((status, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Check;

    async fn drained(doc: &serde_json::Value) -> HttpResponse {
        let raw = serde_json::to_vec(doc).unwrap();
        let body = DrainBodyFuture::new(byte_body(raw), 1024, MAX_BODY_BYTES)
            .await
            .unwrap();
        HttpResponse {
            status: 200,
            latency: Duration::from_millis(1),
            body,
        }
    }

    #[tokio::test]
    async fn large_json_bodies_keep_their_keys() {
        let doc = serde_json::json!({
            "short_key": "abc123",
            "original_url": "https://example.com/long",
            "padding": "x".repeat(200 * 1024),
        });
        let outcome = Outcome::Response(drained(&doc).await);
        assert!(Check::BodyHasKey("short_key".to_string()).evaluate(&outcome));
        assert!(Check::BodyHasKey("original_url".to_string()).evaluate(&outcome));
    }

    #[tokio::test]
    async fn bodies_past_the_cap_are_truncated() {
        let doc = serde_json::json!({
            "short_key": "abc123",
            "padding": "x".repeat(MAX_BODY_BYTES),
        });
        let resp = drained(&doc).await;
        assert_eq!(resp.body.len(), MAX_BODY_BYTES);
        let outcome = Outcome::Response(resp);
        assert!(!Check::BodyHasKey("short_key".to_string()).evaluate(&outcome));
    }
}
