//! Platform keychain access for secret storage
//!
//! [`KeychainProvider`] is a thin wrapper over the platform keychain (macOS
//! Keychain Access, Windows Credential Manager, Linux Secret Service) keyed
//! by a service name and a per-secret account key.
//!
//! [`SecretStore`] abstracts the four operations so that callers can swap
//! the real keychain for [`crate::testing::MockKeychainProvider`] in tests.
//!
//! ## Usage
//!
//! ```no_run
//! use quill_common::security::keychain::{KeychainProvider, SecretStore};
//!
//! let keychain = KeychainProvider::new("Quill.session");
//! keychain.set_secret("access_token", "super-secret")?;
//! let secret = keychain.get_secret("access_token")?;
//! assert_eq!(secret, "super-secret");
//! # Ok::<(), quill_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Synchronous secret storage keyed by string
pub trait SecretStore: Send + Sync {
    /// Store a secret, replacing any previous value
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Retrieve a secret, or `KeychainError::NotFound`
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Delete a secret (idempotent)
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    /// Whether a secret is present
    fn secret_exists(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}

/// Keychain provider for a single service namespace
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Arguments
    /// * `service_name` - Service identifier (e.g., "Quill.session")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// The service namespace entries are stored under
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

impl SecretStore for KeychainProvider {
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    /// # Errors
    /// Returns `KeychainError::NotFound` if secret doesn't exist
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => KeychainError::NotFound,
            other => KeychainError::AccessFailed(format!(
                "Failed to retrieve secret for {key}: {other}"
            )),
        })
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }

    fn secret_exists(&self, key: &str) -> bool {
        self.create_entry(key).is_ok_and(|entry| entry.get_password().is_ok())
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// Underlying keyring library error
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

#[cfg(test)]
mod tests {
    //! Unit tests for security::keychain.
    use super::*;
    use crate::testing::MockKeychainProvider;

    /// Validates `KeychainProvider::new` behavior for the keychain provider
    /// creation scenario.
    ///
    /// Assertions:
    /// - Confirms `keychain.service_name()` equals `"Quill.test"`.
    #[test]
    fn test_keychain_provider_creation() {
        let keychain = KeychainProvider::new("Quill.test");
        assert_eq!(keychain.service_name(), "Quill.test");
    }

    /// Validates the `SecretStore` contract through the in-memory provider
    /// for the set, get and delete scenario.
    ///
    /// Assertions:
    /// - Ensures the secret exists after `set_secret`.
    /// - Confirms the retrieved value equals the stored one.
    /// - Ensures a second delete is still `Ok` and the secret is gone.
    #[test]
    fn test_set_get_and_delete_secret() {
        let store: Box<dyn SecretStore> = Box::new(MockKeychainProvider::new("Quill.test"));

        store.set_secret("access_token", "super-secret").unwrap();
        assert!(store.secret_exists("access_token"));
        assert_eq!(store.get_secret("access_token").unwrap(), "super-secret");

        store.delete_secret("access_token").unwrap();
        store.delete_secret("access_token").unwrap();
        assert!(!store.secret_exists("access_token"));
        assert!(matches!(store.get_secret("access_token"), Err(KeychainError::NotFound)));
    }
}
