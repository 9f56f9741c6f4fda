//! Credential lifecycle
//!
//! - [`credential`]: the bearer credential and its lifecycle states
//! - [`credential_store`]: persistence into a key-value store
//! - [`credential_manager`]: attach, single-flight refresh, session end
//! - [`ports`]: how a refresh is actually performed

pub mod credential;
pub mod credential_manager;
pub mod credential_store;
pub mod ports;

pub use credential::{Credential, CredentialState};
pub use credential_manager::{AttachedCredential, CredentialManager};
pub use credential_store::CredentialStore;
pub use ports::CredentialRefresher;
