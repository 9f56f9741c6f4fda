//! Mock implementations of common traits
//!
//! Provides mock objects for testing purposes.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::security::{KeychainError, SecretStore};

type StorageData = Arc<Mutex<HashMap<String, String>>>;

/// In-memory keychain for tests
///
/// Clones share the same storage, so a test can keep a handle and inspect
/// what the code under test persisted.
#[derive(Debug, Clone, Default)]
pub struct MockKeychainProvider {
    storage: StorageData,
    service_name: String,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), ..Self::default() }
    }

    /// The service namespace this mock stands in for
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make every subsequent write fail with `AccessFailed`
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Snapshot of the stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored secrets
    pub fn len(&self) -> usize {
        self.storage.lock().unwrap().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(KeychainError::AccessFailed(format!("mock write refused for {key}")));
        }
        self.storage.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.storage.lock().unwrap().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.storage.lock().unwrap().remove(key);
        Ok(())
    }

    fn secret_exists(&self, key: &str) -> bool {
        self.storage.lock().unwrap().contains_key(key)
    }
}
