//! Client configuration
//!
//! Every field has a default, so a config file only needs to name what it
//! changes. Durations are integer milliseconds.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{CourierError, Result};
use crate::utils::duration_millis;

/// Settings for one `ApiClient` instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin; request paths are joined onto it
    pub base_url: String,

    /// Transport timeout for ordinary requests
    #[serde(with = "duration_millis")]
    pub timeout: Duration,

    /// Transport timeout for multipart uploads
    #[serde(with = "duration_millis")]
    pub upload_timeout: Duration,

    /// Ceiling on retries in flight across the whole client
    pub max_concurrent_retries: usize,

    /// Initial backoff for requests that don't set their own
    #[serde(with = "duration_millis")]
    pub default_retry_delay: Duration,

    /// TTL for cached responses that don't set their own
    #[serde(with = "duration_millis")]
    pub default_cache_ttl: Duration,

    /// Optional bound on cached responses
    pub cache_max_entries: Option<usize>,

    /// Query parameter carrying the cache-busting timestamp
    pub cache_bust_param: String,

    /// Append the cache-busting timestamp to every GET
    pub cache_bust_enabled: bool,

    /// Substring of an error envelope's message that means "access token invalid"
    pub invalid_token_marker: String,

    /// Token renewal endpoint, relative to `base_url`
    pub refresh_path: String,

    /// Failsafe after which another session-expired notification may fire
    #[serde(with = "duration_millis")]
    pub login_alert_reset: Duration,

    /// Key of the persisted token record
    pub storage_key: String,

    /// Directory for the file-backed token mirror; in-memory when unset
    pub storage_dir: Option<PathBuf>,

    /// `User-Agent` sent by the HTTP transport; reqwest's default when unset
    pub user_agent: Option<String>,

    /// Tracing subscriber settings
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            upload_timeout: Duration::from_millis(UPLOAD_TIMEOUT_MS),
            max_concurrent_retries: MAX_CONCURRENT_RETRIES,
            default_retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            default_cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            cache_max_entries: None,
            cache_bust_param: CACHE_BUST_PARAM.to_string(),
            cache_bust_enabled: true,
            invalid_token_marker: DEFAULT_INVALID_TOKEN_MARKER.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_alert_reset: Duration::from_millis(LOGIN_ALERT_RESET_MS),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: None,
            user_agent: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Same config pointed at another backend
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(CourierError::Config("base_url must not be empty".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(CourierError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout.is_zero() || self.upload_timeout.is_zero() {
            return Err(CourierError::Config("timeouts must be greater than zero".into()));
        }
        if self.cache_bust_param.is_empty() {
            return Err(CourierError::Config("cache_bust_param must not be empty".into()));
        }
        if self.invalid_token_marker.is_empty() {
            return Err(CourierError::Config("invalid_token_marker must not be empty".into()));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(CourierError::Config("refresh_path must start with '/'".into()));
        }
        if self.storage_key.is_empty() {
            return Err(CourierError::Config("storage_key must not be empty".into()));
        }
        if self.user_agent.as_deref().is_some_and(|agent| agent.trim().is_empty()) {
            return Err(CourierError::Config("user_agent must not be blank".into()));
        }
        if self.cache_max_entries == Some(0) {
            return Err(CourierError::Config("cache_max_entries must be at least 1".into()));
        }
        Ok(())
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// JSON lines instead of compact text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
