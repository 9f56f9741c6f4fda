//! Error types used outside the request pipeline
//!
//! The pipeline itself reports failures as `ClientError` (see `quill-core`).
//! `QuillError` covers what happens around it: loading configuration,
//! talking to the credential store, decoding persisted data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Quill infrastructure operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for QuillError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for QuillError {
    fn from(err: chrono::ParseError) -> Self {
        Self::Serialization(format!("invalid timestamp: {err}"))
    }
}

/// Result type alias for Quill operations
pub type Result<T> = std::result::Result<T, QuillError>;
