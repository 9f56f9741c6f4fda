//! Conversions from external infrastructure errors into domain and port
//! errors.

use std::error::Error as StdError;

use keyring::Error as KeyringError;
use quill_common::KeychainError;
use quill_core::{FaultKind, TransportFailure};
use quill_domain::QuillError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub QuillError);

impl From<InfraError> for QuillError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<QuillError> for InfraError {
    fn from(value: QuillError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoQuillError {
    fn into_quill(self) -> QuillError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error / KeychainError → QuillError */
/* -------------------------------------------------------------------------- */

impl IntoQuillError for KeyringError {
    fn into_quill(self) -> QuillError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => QuillError::NotFound("keychain entry not found".into()),
            BadEncoding(_) => {
                QuillError::Storage("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => QuillError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                QuillError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            PlatformFailure(err) => QuillError::Storage(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                QuillError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => QuillError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_quill())
    }
}

impl IntoQuillError for KeychainError {
    fn into_quill(self) -> QuillError {
        match self {
            KeychainError::NotFound => QuillError::NotFound("keychain entry not found".into()),
            KeychainError::AccessFailed(message) => {
                QuillError::Storage(format!("keychain access failed: {message}"))
            }
            KeychainError::Keyring(err) => err.into_quill(),
        }
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        InfraError(value.into_quill())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → QuillError / TransportFailure */
/* -------------------------------------------------------------------------- */

impl IntoQuillError for HttpError {
    fn into_quill(self) -> QuillError {
        if self.is_builder() {
            return QuillError::Config(format!("invalid HTTP client setup: {self}"));
        }
        QuillError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_quill())
    }
}

/// Classify a reqwest failure for the transport port
///
/// Name resolution failures surface as connect errors; they are told apart
/// from refusals by the text of the underlying cause.
pub fn transport_failure(err: &HttpError) -> TransportFailure {
    let detail = error_chain(err);

    let fault = if err.is_timeout() {
        FaultKind::TimedOut
    } else if err.is_connect() {
        if looks_like_dns_failure(&detail) {
            FaultKind::NotFound
        } else {
            FaultKind::Refused
        }
    } else if err.is_request() || err.is_body() || err.is_decode() {
        FaultKind::Aborted
    } else {
        FaultKind::Other
    };

    TransportFailure::new(fault, detail)
}

fn error_chain(err: &HttpError) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

fn looks_like_dns_failure(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["dns", "lookup", "resolve", "name or service not known", "nodename nor servname"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
