//! # Quill Domain
//!
//! Backend resource types and models for the Quill client.
//!
//! This crate contains:
//! - Resource types exchanged with the content backend (posts, comments,
//!   likes, users, auth payloads)
//! - Domain error types and Result definitions
//! - Client configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Quill crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
