//! # Quill Infrastructure
//!
//! Infrastructure implementations of core ports and the outward API.
//!
//! This crate contains:
//! - The `reqwest` transport
//! - The keychain-backed credential store
//! - Configuration loading (environment, TOML, JSON)
//! - The content API and authentication service
//!
//! ## Architecture
//! - Implements traits defined in `quill-core`
//! - Depends on `quill-common`, `quill-domain` and `quill-core`
//! - Contains all "impure" code (network, keychain, filesystem)

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod storage;

// Re-export commonly used items
pub use api::{AuthService, ContentApi, HttpCredentialRefresher};
pub use client::{QuillClient, QuillClientBuilder};
pub use errors::InfraError;
pub use http::{HttpTransport, HttpTransportBuilder};
pub use storage::KeychainStore;
