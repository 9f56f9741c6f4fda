//! Failure normalization
//!
//! Maps raw transport faults and non-2xx responses onto [`ClientError`].
//! Rules, first match wins:
//!
//! | Input | Kind | Retryable |
//! |-------|------|-----------|
//! | no response, refused / unknown host / dropped | `Network` | yes |
//! | no response, timed out | `Timeout` | yes |
//! | no response, unclassified | `Unknown` | no |
//! | status >= 500 | `Server` | yes |
//! | status 401 | `Auth` | no |
//! | other 4xx | `Validation` | no |
//! | anything else | `Unknown` | no |
//!
//! Response messages come from the body's `message` field (a string or an
//! array of strings) or its `error` field, translated for display.

use serde_json::Value;

use super::translation::translate;
use super::{ClientError, ErrorKind};
use crate::transport_ports::{FaultKind, TransportFailure, TransportResponse};

/// A failure before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// No HTTP response was received
    Transport(TransportFailure),
    /// A response with a non-success status
    Response { status: u16, body: String },
}

impl From<TransportFailure> for RawFailure {
    fn from(failure: TransportFailure) -> Self {
        Self::Transport(failure)
    }
}

impl From<TransportResponse> for RawFailure {
    fn from(response: TransportResponse) -> Self {
        Self::Response { status: response.status, body: response.body }
    }
}

/// Normalize a raw failure
pub fn normalize(failure: RawFailure) -> ClientError {
    match failure {
        RawFailure::Transport(failure) => from_fault(failure.fault),
        RawFailure::Response { status, body } => from_response(status, &body),
    }
}

fn from_fault(fault: FaultKind) -> ClientError {
    match fault {
        FaultKind::Refused => ClientError::network("Could not connect to the server"),
        FaultKind::NotFound => ClientError::network("Server address could not be found"),
        FaultKind::TimedOut => ClientError::timeout("The server took too long to respond"),
        FaultKind::Aborted => ClientError::network("The request was interrupted"),
        FaultKind::Other => ClientError::unknown("An unexpected network error occurred"),
    }
}

fn from_response(status: u16, body: &str) -> ClientError {
    let kind = match status {
        500..=u16::MAX => ErrorKind::Server,
        401 => ErrorKind::Auth,
        400..=499 => ErrorKind::Validation,
        _ => ErrorKind::Unknown,
    };
    let message = body_message(body).unwrap_or_else(|| default_message(kind, status));
    ClientError::new(kind, Some(status), kind == ErrorKind::Server, message)
}

/// Translated message from a JSON error body, if it carries one
fn body_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    let from_message = match value.get("message") {
        Some(Value::String(text)) => non_empty(translate(text)),
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(translate)
                .filter(|part| !part.is_empty())
                .collect();
            non_empty(parts.join("; "))
        }
        _ => None,
    };

    from_message
        .or_else(|| value.get("error").and_then(Value::as_str).map(translate).and_then(non_empty))
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn default_message(kind: ErrorKind, status: u16) -> String {
    match kind {
        ErrorKind::Server => format!("The server encountered an error (HTTP {status})"),
        ErrorKind::Auth => format!("Authentication required (HTTP {status})"),
        ErrorKind::Validation => format!("The request was rejected (HTTP {status})"),
        _ => format!("Unexpected response from the server (HTTP {status})"),
    }
}
