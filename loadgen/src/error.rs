use std::path::PathBuf;

/// Problems with a load-test configuration. All of them are fatal and are
/// reported before any virtual user starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("stage list is empty")]
    EmptyStages,

    #[error("stage {index} has a zero duration")]
    ZeroDuration { index: usize },

    #[error("stage {index} has a negative target ({target})")]
    NegativeTarget { index: usize, target: i64 },

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
}
