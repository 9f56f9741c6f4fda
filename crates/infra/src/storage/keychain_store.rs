//! Keychain-backed [`KeyValueStore`]
//!
//! Each key is one keychain entry under the configured service name. The OS
//! keychain API is blocking, so every call runs on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use quill_common::{KeychainProvider, SecretStore};
use quill_core::KeyValueStore;
use quill_domain::{QuillError, Result};
use tracing::debug;

use crate::errors::InfraError;

/// Stores credential entries in the platform keychain
pub struct KeychainStore<S: SecretStore + 'static = KeychainProvider> {
    secrets: Arc<S>,
}

impl KeychainStore<KeychainProvider> {
    /// Store over the platform keychain under `service_name`
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self::new(KeychainProvider::new(service_name))
    }
}

impl<S: SecretStore + 'static> KeychainStore<S> {
    pub fn new(secrets: S) -> Self {
        Self { secrets: Arc::new(secrets) }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let secrets = Arc::clone(&self.secrets);
        tokio::task::spawn_blocking(move || op(&secrets))
            .await
            .map_err(|err| QuillError::Internal(format!("keychain task failed: {err}")))?
    }
}

#[async_trait]
impl<S: SecretStore + 'static> KeyValueStore for KeychainStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.blocking(move |secrets| match secrets.get_secret(&key) {
            Ok(value) => Ok(Some(value)),
            Err(err) => match QuillError::from(InfraError::from(err)) {
                QuillError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |secrets| {
            secrets.set_secret(&key, &value).map_err(|err| InfraError::from(err).into())
        })
        .await
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        self.blocking(move |secrets| {
            for key in &keys {
                match secrets.delete_secret(key).map_err(|err| QuillError::from(InfraError::from(err))) {
                    Ok(()) | Err(QuillError::NotFound(_)) => {}
                    Err(other) => return Err(other),
                }
            }
            debug!(count = keys.len(), "Keychain entries removed");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use quill_common::testing::MockKeychainProvider;

    use super::*;

    #[tokio::test]
    async fn test_get_set_and_remove() {
        let mock = MockKeychainProvider::new("Quill.test");
        let store = KeychainStore::new(mock.clone());

        assert_eq!(store.get("access_token").await.unwrap(), None);
        store.set("access_token", "secret").await.unwrap();
        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("secret"));

        store.remove_all(&["access_token", "never_written"]).await.unwrap();
        assert!(mock.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_storage_error() {
        let mock = MockKeychainProvider::new("Quill.test");
        mock.fail_writes(true);
        let store = KeychainStore::new(mock);

        let err = store.set("access_token", "secret").await.unwrap_err();
        assert!(matches!(err, QuillError::Storage(_)));
    }
}
