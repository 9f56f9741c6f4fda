//! Application constants
//!
//! Centralized location for domain-level defaults. Every value here can be
//! overridden through `ClientConfig`.

// Endpoint discovery
pub const DEFAULT_ENDPOINTS: &[&str] = &["http://10.0.2.2:3000", "http://localhost:3000"];
pub const DEFAULT_PROBE_PATH: &str = "/";
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;

// Requests
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

// Retry schedule
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

// Credentials
pub const DEFAULT_REFRESH_SKEW_SECS: u64 = 30;
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Quill.session";
pub const ACCESS_SECRET_KEY: &str = "access_token";
pub const REFRESH_SECRET_KEY: &str = "refresh_token";
pub const EXPIRY_KEY: &str = "token_expiry";

/// Lifetime assumed for an access secret issued without `expiresIn`
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3_600;

/// Upper bound on a server-reported `expiresIn` (ten years)
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 3_600;
