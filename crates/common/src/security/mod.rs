//! Security primitives
//!
//! Currently limited to platform keychain storage for session secrets.

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider, SecretStore};
