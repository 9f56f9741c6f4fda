//! Error classification shared across Quill crates
//!
//! Concrete error enums live next to the code that produces them (the
//! pipeline's `ClientError`, the domain's `QuillError`). What they share is
//! the [`ErrorClassification`] trait: a uniform way for generic machinery
//! such as the retry orchestrator to ask "is this transient?" without
//! knowing the concrete type.
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Informational, expected conditions | Resource not found, empty results |
//! | **Warning** | Degraded but operational | Transient network failures, server hiccups |
//! | **Error** | Failure requiring attention | Rejected credentials, invalid input |
//! | **Critical** | System integrity at risk | Unreadable credential store, internal errors |
//!
//! ## Using ErrorClassification for retry logic
//!
//! ```rust,ignore
//! use quill_common::error::ErrorClassification;
//!
//! fn should_try_again<E: ErrorClassification>(error: &E, attempt: u32) -> bool {
//!     attempt < 3 && error.is_retryable()
//! }
//! ```

use std::time::Duration;

/// Trait for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as refused connections, timeouts or 5xx responses.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the error itself carries a delay hint
    /// (e.g. a `Retry-After` header). `None` leaves the decision to the
    /// configured backoff.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention
    Error,
    /// Critical, requires immediate action
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}
