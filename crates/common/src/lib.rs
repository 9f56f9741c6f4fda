//! Modular common utilities shared across Quill crates.
//!
//! Nothing in this crate knows about posts, users or the content backend;
//! it holds the generic building blocks the client pipeline is assembled
//! from.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification
//! - `observability`: tracing subscriber setup
//! - `runtime`: async infrastructure (retry orchestration, single-flight)
//! - `platform`: platform integrations (keychain secret storage)
//! - `test-utils`: in-memory mocks for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Observability tier
// --------------------------------------------------------------
#[cfg(feature = "observability")]
pub mod observability;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "platform", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{
    policies, BackoffStrategy, FlightAborted, Jitter, RetryConfig, RetryConfigBuilder,
    RetryConfigError, RetryDecision, RetryExecutor, RetryOutcome, RetryPolicy, SingleFlight,
};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider, SecretStore};
