//! Configuration loader
//!
//! Loads the client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `QUILL_ENDPOINTS` is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `QUILL_ENDPOINTS`: Comma-separated candidate base URLs (required)
//! - `QUILL_REQUEST_TIMEOUT_MS`: Per-request timeout
//! - `QUILL_PROBE_TIMEOUT_MS`: Per-probe timeout
//! - `QUILL_PROBE_PATH`: Path requested when probing a candidate
//! - `QUILL_RETRY_MAX_ATTEMPTS`: Attempts per idempotent request
//! - `QUILL_RETRY_BASE_DELAY_MS`: First backoff delay
//! - `QUILL_RETRY_BACKOFF_MULTIPLIER`: Backoff growth factor
//! - `QUILL_RETRY_MAX_DELAY_MS`: Backoff ceiling
//! - `QUILL_RETRY_JITTER`: Whether delays are jittered (true/false)
//! - `QUILL_REFRESH_SKEW_SECS`: Refresh this long before expiry
//! - `QUILL_KEYCHAIN_SERVICE`: Keychain service name for the credential
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./quill.toml` or `./quill.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `../quill.toml` or `../quill.json` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use quill_domain::{ClientConfig, QuillError, Result};
use url::Url;

const CONFIG_FILE_NAMES: [&str; 4] = ["quill.toml", "quill.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If `QUILL_ENDPOINTS`
/// is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `QuillError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) if std::env::var("QUILL_ENDPOINTS").is_ok() => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `QUILL_ENDPOINTS` is required; every other variable overrides the
/// corresponding default when set.
///
/// # Errors
/// Returns `QuillError::Config` if `QUILL_ENDPOINTS` is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let endpoints = env_var("QUILL_ENDPOINTS")?;
    let mut config = ClientConfig::with_endpoints(
        endpoints.split(',').map(str::trim).filter(|endpoint| !endpoint.is_empty()),
    );

    if let Some(value) = env_parse("QUILL_REQUEST_TIMEOUT_MS")? {
        config.request_timeout_ms = value;
    }
    if let Some(value) = env_parse("QUILL_PROBE_TIMEOUT_MS")? {
        config.probe_timeout_ms = value;
    }
    if let Ok(path) = std::env::var("QUILL_PROBE_PATH") {
        config.probe_path = path;
    }
    if let Some(value) = env_parse("QUILL_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = value;
    }
    if let Some(value) = env_parse("QUILL_RETRY_BASE_DELAY_MS")? {
        config.retry.base_delay_ms = value;
    }
    if let Some(value) = env_parse("QUILL_RETRY_BACKOFF_MULTIPLIER")? {
        config.retry.backoff_multiplier = value;
    }
    if let Some(value) = env_parse("QUILL_RETRY_MAX_DELAY_MS")? {
        config.retry.max_delay_ms = value;
    }
    config.retry.jitter = env_bool("QUILL_RETRY_JITTER", config.retry.jitter);
    if let Some(value) = env_parse("QUILL_REFRESH_SKEW_SECS")? {
        config.auth.refresh_skew_secs = value;
    }
    if let Ok(service) = std::env::var("QUILL_KEYCHAIN_SERVICE") {
        config.storage.service_name = service;
    }

    validate(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Fields missing from the file keep their defaults.
///
/// # Errors
/// Returns `QuillError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(QuillError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            QuillError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| QuillError::Config(format!("Failed to read config file: {e}")))?;

    validate(parse_config(&contents, &config_path)?)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| QuillError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| QuillError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(QuillError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Field validation plus a full URL parse of every endpoint
fn validate(config: ClientConfig) -> Result<ClientConfig> {
    config.validate()?;
    for endpoint in config.normalized_endpoints() {
        let url = Url::parse(&endpoint)
            .map_err(|e| QuillError::Config(format!("Invalid endpoint {endpoint}: {e}")))?;
        if url.host_str().is_none() {
            return Err(QuillError::Config(format!("Endpoint has no host: {endpoint}")));
        }
    }
    Ok(config)
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its parent, then the directory
/// of the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| cwd.join("..").join(name)));
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        QuillError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `QuillError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| QuillError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
