//! Load-test configuration.
//!
//! Loaded from a JSON file, durations written as humantime strings
//! (`"15m"`, `"100ms"`). `LOADGEN_BASE_URL` overrides the base url.

use std::path::Path;
use std::time::Duration;

use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stage::{stages_from_config, StageConfig, StageController};

pub const BASE_URL_ENV: &str = "LOADGEN_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://py-url-shortener:8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTestConfig {
    /// Root of the shortener service, without a trailing slash
    pub base_url: String,
    pub stages: Vec<StageConfig>,
    /// Pause at the end of every iteration
    #[serde(with = "humantime_serde")]
    pub inter_iteration_pause: Duration,
    /// Responses slower than this fail their latency check
    #[serde(with = "humantime_serde")]
    pub latency_threshold: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How often the scheduler reconciles against the stage target
    #[serde(with = "humantime_serde")]
    pub control_tick: Duration,
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stages: vec![StageConfig::new(Duration::from_secs(15 * 60), 500)],
            inter_iteration_pause: Duration::from_millis(100),
            latency_threshold: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
            control_tick: Duration::from_millis(100),
            report_interval: Duration::from_secs(10),
        }
    }
}

impl LoadTestConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Applies environment overrides on top of the loaded values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    /// Checks everything that must hold before the first virtual user starts
    /// and returns the controller for the validated ramp.
    pub fn validate(&self) -> Result<StageController, ConfigError> {
        self.validate_base_url()?;
        for (field, value) in [
            ("inter_iteration_pause", self.inter_iteration_pause),
            ("latency_threshold", self.latency_threshold),
            ("request_timeout", self.request_timeout),
            ("control_tick", self.control_tick),
            ("report_interval", self.report_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroInterval { field });
            }
        }
        StageController::new(stages_from_config(&self.stages)?)
    }

    /// The base url without trailing slashes.
    #[must_use]
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn validate_base_url(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: reason.to_string(),
        };
        let uri: Uri = self
            .trimmed_base_url()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| invalid(&e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// is supported"));
        }
        if uri.authority().is_none() {
            return Err(invalid("missing host"));
        }
        Ok(())
    }
}
