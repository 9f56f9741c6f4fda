//! The client error taxonomy
//!
//! Every failure the outward API reports is a [`ClientError`]: a kind, the
//! HTTP status when one was received, a retryable flag and a message that
//! is safe to show to the user. Errors are produced by the normalizer
//! (see [`normalizer`]) and never mutated afterwards.

pub mod normalizer;
pub mod translation;

use std::fmt;

use quill_common::{ErrorClassification, ErrorSeverity, FlightAborted};
use quill_domain::QuillError;
use serde::Serialize;
use thiserror::Error;

pub use normalizer::{normalize, RawFailure};
pub use translation::translate;

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response: connection refused, unknown host, dropped connection
    Network,
    /// No response within the timeout
    Timeout,
    /// Missing, expired or rejected credential
    Auth,
    /// The backend rejected the request (4xx other than 401)
    Validation,
    /// The backend failed (5xx)
    Server,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Network-class failures mean the endpoint itself may be unreachable
    pub const fn is_network_class(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized client failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ClientError {
    kind: ErrorKind,
    http_status: Option<u16>,
    retryable: bool,
    message: String,
}

impl ClientError {
    /// Build an error with explicit fields
    pub fn new(
        kind: ErrorKind,
        http_status: Option<u16>,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self { kind, http_status, retryable, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, None, true, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, None, true, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, None, false, message)
    }

    pub fn validation(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, Some(status), false, message)
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, Some(status), true, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, None, false, message)
    }

    /// Copy of this error carrying an HTTP status
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub const fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a repeat of the same request might succeed
    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn is_network_class(&self) -> bool {
        self.kind.is_network_class()
    }

    pub const fn is_auth(&self) -> bool {
        matches!(self.kind, ErrorKind::Auth)
    }
}

impl ErrorClassification for ClientError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server => ErrorSeverity::Warning,
            ErrorKind::Validation => ErrorSeverity::Info,
            ErrorKind::Auth | ErrorKind::Unknown => ErrorSeverity::Error,
        }
    }
}

impl From<FlightAborted> for ClientError {
    fn from(err: FlightAborted) -> Self {
        Self::unknown(format!("Request could not be completed ({err})"))
    }
}

impl From<QuillError> for ClientError {
    fn from(err: QuillError) -> Self {
        match err {
            QuillError::Auth(message) => Self::auth(message),
            QuillError::Network(message) => Self::network(message),
            other => Self::unknown(other.to_string()),
        }
    }
}
