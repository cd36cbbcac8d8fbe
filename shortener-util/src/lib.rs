pub mod drain;

use std::collections::HashMap;
use std::sync::Arc;
use bytes::Bytes;
use http_body_util::Full;
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;

pub const SHORT_KEY_LEN: usize = 6;

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[inline]
pub fn byte_body<B: Into<Bytes>>(bytes: B) -> Full<Bytes> {
    Full::new(bytes.into())
}

/// A URL is accepted when it is absolute http(s) and longer than 10 bytes.
#[must_use]
pub fn validate_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && url.len() > 10
}

#[must_use]
pub fn validate_custom_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[must_use]
pub fn generate_short_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_KEY_LEN)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    KeyExists,
    KeySpaceExhausted,
}

/// In-memory `short_key -> original_url` mapping shared between handlers.
#[derive(Clone, Default)]
pub struct ShortKeyStore {
    urls: Arc<RwLock<HashMap<String, String>>>,
}

impl ShortKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `url` under a freshly generated key, giving up after 10 collisions.
    pub fn insert_generated(&self, url: &str) -> Result<ShortKeyResponse, InsertError> {
        let mut urls = self.urls.write();
        for _ in 0..10 {
            let short_key = generate_short_key();
            if urls.contains_key(&short_key) {
                continue;
            }
            urls.insert(short_key.clone(), url.to_string());
            return Ok(ShortKeyResponse {
                short_key,
                original_url: url.to_string(),
            });
        }
        Err(InsertError::KeySpaceExhausted)
    }

    pub fn insert_custom(&self, key: &str, url: &str) -> Result<ShortKeyResponse, InsertError> {
        let mut urls = self.urls.write();
        if urls.contains_key(key) {
            return Err(InsertError::KeyExists);
        }
        urls.insert(key.to_string(), url.to_string());
        Ok(ShortKeyResponse {
            short_key: key.to_string(),
            original_url: url.to_string(),
        })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.urls.read().get(key).cloned()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.read().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShortKeyRequest {
    pub url: String,
}

impl ShortKeyRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CustomShortKeyRequest {
    pub url: String,
    pub custom_key: String,
}

impl CustomShortKeyRequest {
    #[must_use]
    pub fn new(url: impl Into<String>, custom_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            custom_key: custom_key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShortKeyResponse {
    pub short_key: String,
    pub original_url: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
