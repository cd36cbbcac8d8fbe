use std::time::Duration;

use hyper::Method;
use rand::Rng;
use shortener_util::{CustomShortKeyRequest, ShortKeyRequest};

use crate::check::{Check, NamedCheck};
use crate::client::Outcome;

/// Key resolved when the generic create did not hand one back.
pub const FALLBACK_SHORT_KEY: &str = "test-key";

const CREATE_ROUTE: &str = "/short-key";
const CUSTOM_ROUTE: &str = "/short-key/custom";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPath {
    Fixed(String),
    /// `/short-key/{key}` with the `short_key` returned by an earlier step of
    /// the same iteration, or `fallback` if that step has none to give.
    ShortKeyOf { step: usize, fallback: String },
}

#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Route label used as the prefix of every check name
    pub label: String,
    pub method: Method,
    pub path: RequestPath,
    pub body: Option<serde_json::Value>,
    pub checks: Vec<NamedCheck>,
}

impl RequestSpec {
    /// The concrete path, given the outcomes of the steps that ran before it.
    #[must_use]
    pub fn resolve_path(&self, earlier: &[Outcome]) -> String {
        match &self.path {
            RequestPath::Fixed(path) => path.clone(),
            RequestPath::ShortKeyOf { step, fallback } => {
                let key = earlier
                    .get(*step)
                    .and_then(short_key_from)
                    .unwrap_or_else(|| fallback.clone());
                format!("{CREATE_ROUTE}/{key}")
            }
        }
    }
}

/// Pulls `short_key` out of a 200 create response. Anything else, including a
/// body that is not JSON or an empty key, yields `None`.
#[must_use]
pub fn short_key_from(outcome: &Outcome) -> Option<String> {
    let resp = outcome.response().filter(|r| r.status == 200)?;
    let body: serde_json::Value = serde_json::from_slice(&resp.body).ok()?;
    body.get("short_key")
        .and_then(serde_json::Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Random lowercase base36 string.
#[must_use]
pub fn random_suffix<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Builds the three-request iteration against the shortener.
#[derive(Debug, Clone)]
pub struct RequestPlanner {
    latency_threshold: Duration,
}

impl RequestPlanner {
    #[must_use]
    pub fn new(latency_threshold: Duration) -> Self {
        Self { latency_threshold }
    }

    #[must_use]
    pub fn plan_iteration(&self) -> Vec<RequestSpec> {
        let mut rng = rand::thread_rng();
        let create_url = format!("https://example.com/test-{}", random_suffix(&mut rng, 7));
        let custom_url = format!("https://google.com/page-{}", random_suffix(&mut rng, 6));
        let custom_key = format!("custom-{}", random_suffix(&mut rng, 6));

        vec![
            self.create_spec(
                CREATE_ROUTE,
                serde_json::json!(ShortKeyRequest::new(create_url)),
            ),
            self.create_spec(
                CUSTOM_ROUTE,
                serde_json::json!(CustomShortKeyRequest::new(custom_url, custom_key)),
            ),
            self.resolve_spec(0),
        ]
    }

    fn create_spec(&self, route: &str, body: serde_json::Value) -> RequestSpec {
        let label = format!("POST {route}");
        RequestSpec {
            checks: vec![
                NamedCheck::new(format!("{label} status is 200"), Check::StatusIn(vec![200])),
                self.latency_check(&label),
                NamedCheck::new(
                    format!("{label} has short_key"),
                    Check::BodyHasKey("short_key".to_string()),
                ),
                NamedCheck::new(
                    format!("{label} has original_url"),
                    Check::BodyHasKey("original_url".to_string()),
                ),
            ],
            label,
            method: Method::POST,
            path: RequestPath::Fixed(route.to_string()),
            body: Some(body),
        }
    }

    fn resolve_spec(&self, step: usize) -> RequestSpec {
        let label = "GET /short-key/{short-key}".to_string();
        RequestSpec {
            checks: vec![
                NamedCheck::new(
                    format!("{label} status is 200 or 302"),
                    Check::StatusIn(vec![200, 302]),
                ),
                self.latency_check(&label),
            ],
            label,
            method: Method::GET,
            path: RequestPath::ShortKeyOf {
                step,
                fallback: FALLBACK_SHORT_KEY.to_string(),
            },
            body: None,
        }
    }

    fn latency_check(&self, label: &str) -> NamedCheck {
        NamedCheck::new(
            format!(
                "{label} response time < {}ms",
                self.latency_threshold.as_millis()
            ),
            Check::LatencyUnder(self.latency_threshold),
        )
    }
}
