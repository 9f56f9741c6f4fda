//! Resilience patterns for transient failures
//!
//! This module provides generic, reusable building blocks:
//! - **Retry Logic**: bounded attempts with exponential backoff and upward
//!   jitter, returning the operation's own last error
//! - **Single Flight**: coalescing concurrent callers onto one in-flight
//!   operation (used for credential refresh and endpoint probing)
//!
//! Both are generic over the error type. Domain code decides what is
//! retryable through [`crate::ErrorClassification`] or a custom
//! [`RetryPolicy`].

pub mod retry;
pub mod single_flight;

pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryConfigError,
    RetryContext, RetryDecision, RetryExecutor, RetryOutcome, RetryPolicy,
};
pub use single_flight::{FlightAborted, SingleFlight};
