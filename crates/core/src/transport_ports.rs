//! Transport port
//!
//! The pipeline never talks to an HTTP library directly. It hands a fully
//! built [`TransportRequest`] to a [`Transport`] and gets back either a
//! response (any status) or a [`TransportFailure`] describing why no
//! response arrived. `quill-infra` provides the reqwest-backed adapter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// HTTP method subset used by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether repeating the request is safe by default
    pub const fn is_idempotent(&self) -> bool {
        !matches!(self, Self::Post)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to put on the wire
#[derive(Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL including query string
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self { method, url: url.into(), headers: Vec::new(), body: None, timeout }
    }

    /// Set a header, replacing any existing value (names compare
    /// case-insensitively)
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set `Authorization: Bearer <secret>`
    pub fn set_bearer(&mut self, secret: &str) {
        self.set_header("Authorization", format!("Bearer {secret}"));
    }

    /// The bearer secret currently attached, if any
    pub fn bearer(&self) -> Option<&str> {
        self.header("Authorization").and_then(|value| value.strip_prefix("Bearer "))
    }
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A response of any status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Why no response was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The host actively refused the connection
    Refused,
    /// The host name could not be resolved
    NotFound,
    /// No response within the request timeout
    TimedOut,
    /// The connection dropped mid-request
    Aborted,
    /// Anything the adapter could not classify
    Other,
}

/// Transport-level failure: the request produced no HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{fault:?}: {detail}")]
pub struct TransportFailure {
    pub fault: FaultKind,
    pub detail: String,
}

impl TransportFailure {
    pub fn new(fault: FaultKind, detail: impl Into<String>) -> Self {
        Self { fault, detail: detail.into() }
    }
}

/// Sends requests over the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return whatever response arrives, or the reason
    /// none did. Non-2xx statuses are responses, not failures.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure>;
}
