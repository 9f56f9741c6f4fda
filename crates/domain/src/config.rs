//! Client configuration
//!
//! Loaded once at startup (see `quill_infra::config::load`) and treated as
//! immutable afterwards. Durations are stored as integer milliseconds so the
//! TOML/JSON representation stays flat; use the `*_timeout()` / `*_delay()`
//! accessors to get `Duration`s.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCESS_SECRET_KEY, DEFAULT_ENDPOINTS, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_PROBE_PATH,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_REFRESH_SKEW_SECS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_BACKOFF_MULTIPLIER, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_MS, EXPIRY_KEY, REFRESH_SECRET_KEY,
};
use crate::errors::{QuillError, Result};

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate base URLs, in probe priority order
    pub endpoints: Vec<String>,
    /// Per-request timeout for ordinary calls
    pub request_timeout_ms: u64,
    /// Per-candidate timeout while probing
    pub probe_timeout_ms: u64,
    /// Path requested on each candidate during probing
    pub probe_path: String,
    pub retry: RetrySettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(ToString::to_string).collect(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            retry: RetrySettings::default(),
            auth: AuthSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration with the given candidates and defaults elsewhere
    pub fn with_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { endpoints: endpoints.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Candidates with surrounding whitespace and trailing slashes removed,
    /// blank entries dropped
    pub fn normalized_endpoints(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Probe path with a guaranteed leading slash
    pub fn normalized_probe_path(&self) -> String {
        if self.probe_path.starts_with('/') {
            self.probe_path.clone()
        } else {
            format!("/{}", self.probe_path)
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `QuillError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let endpoints = self.normalized_endpoints();
        if endpoints.is_empty() {
            return Err(QuillError::Config("at least one endpoint is required".into()));
        }
        if let Some(bad) =
            endpoints.iter().find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(QuillError::Config(format!("endpoint must be an http(s) URL: {bad}")));
        }
        if self.request_timeout_ms == 0 {
            return Err(QuillError::Config("request_timeout_ms must be greater than 0".into()));
        }
        if self.probe_timeout_ms == 0 {
            return Err(QuillError::Config("probe_timeout_ms must be greater than 0".into()));
        }
        self.retry.validate()?;
        self.storage.validate()
    }
}

/// Retry schedule for idempotent requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, the initial one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// Randomly lengthen each delay
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(QuillError::Config("retry.max_attempts must be at least 1".into()));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(QuillError::Config(format!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(QuillError::Config(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Credential lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// A credential expiring within this window is refreshed before use
    pub refresh_skew_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self { refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS }
    }
}

impl AuthSettings {
    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.refresh_skew_secs)
    }
}

/// Where the credential is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Keychain service namespace
    pub service_name: String,
    pub access_key: String,
    pub refresh_key: String,
    pub expiry_key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            access_key: ACCESS_SECRET_KEY.to_string(),
            refresh_key: REFRESH_SECRET_KEY.to_string(),
            expiry_key: EXPIRY_KEY.to_string(),
        }
    }
}

impl StorageSettings {
    fn validate(&self) -> Result<()> {
        let keys = [&self.access_key, &self.refresh_key, &self.expiry_key];
        if self.service_name.trim().is_empty() || keys.iter().any(|k| k.trim().is_empty()) {
            return Err(QuillError::Config("storage names must not be blank".into()));
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err(QuillError::Config("storage keys must be distinct".into()));
        }
        Ok(())
    }
}
