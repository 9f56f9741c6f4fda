//! # Quill Core
//!
//! Pure client pipeline logic - no HTTP library, no platform code.
//!
//! This crate contains:
//! - Port interfaces (traits) for transport, persistence, credential
//!   refresh and session notifications
//! - The error taxonomy and failure normalizer
//! - Endpoint discovery, credential lifecycle and the request pipeline
//!
//! ## Architecture Principles
//! - Depends only on `quill-common` and `quill-domain`
//! - All external effects go through ports
//! - Everything is testable with scripted in-memory adapters

pub mod auth;
pub mod connectivity;
pub mod errors;
pub mod pipeline;

// Infrastructure ports
pub mod session_ports;
pub mod storage_ports;
pub mod transport_ports;

// Re-export specific items to avoid ambiguity
pub use auth::{
    AttachedCredential, Credential, CredentialManager, CredentialRefresher, CredentialState,
    CredentialStore,
};
pub use connectivity::{ConnectivityResolver, EndpointStatus};
pub use errors::{normalize, translate, ClientError, ErrorKind, RawFailure};
pub use pipeline::{ApiRequest, ApiResponse, RequestPipeline};
pub use session_ports::SessionObserver;
pub use storage_ports::{InMemoryStore, KeyValueStore};
pub use transport_ports::{
    FaultKind, HttpMethod, Transport, TransportFailure, TransportRequest, TransportResponse,
};
