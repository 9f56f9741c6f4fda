//! Backend API for the Quill content service
//!
//! # Architecture
//!
//! - All calls go through `quill_core::RequestPipeline` (no direct reqwest)
//! - Credential refresh bypasses the pipeline via the transport port
//! - Structured tracing only, secrets never recorded

pub mod auth;
pub mod client;

pub use auth::{AuthService, HttpCredentialRefresher};
pub use client::ContentApi;
