//! Credential persistence
//!
//! Mirrors the in-memory credential into a [`KeyValueStore`] under three
//! keys: access secret, refresh secret and expiry (RFC 3339). A missing or
//! unparseable entry means "no credential"; a broken store never blocks
//! startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quill_domain::{Result, StorageSettings};
use tracing::{debug, warn};

use super::credential::Credential;
use crate::storage_ports::KeyValueStore;

/// Reads and writes the persisted credential
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    keys: StorageSettings,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: StorageSettings) -> Self {
        Self { store, keys }
    }

    /// Load the persisted credential, if a complete one exists
    pub async fn load(&self) -> Option<Credential> {
        match self.try_load().await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(error = %err, "Persisted credential unreadable; treating as absent");
                None
            }
        }
    }

    async fn try_load(&self) -> Result<Option<Credential>> {
        let Some(access) = self.store.get(&self.keys.access_key).await? else {
            debug!("No persisted credential");
            return Ok(None);
        };
        let Some(expiry) = self.store.get(&self.keys.expiry_key).await? else {
            warn!("Persisted credential has no expiry; treating as absent");
            return Ok(None);
        };
        let expires_at = DateTime::parse_from_rfc3339(expiry.trim())?.with_timezone(&Utc);
        let refresh = self.store.get(&self.keys.refresh_key).await?;

        Ok(Some(Credential::new(access, expires_at, refresh)))
    }

    /// Persist `credential`, replacing whatever was stored
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        self.store.set(&self.keys.access_key, credential.access_secret()).await?;
        self.store.set(&self.keys.expiry_key, &credential.expires_at().to_rfc3339()).await?;
        match credential.refresh_secret() {
            Some(refresh) => self.store.set(&self.keys.refresh_key, refresh).await,
            None => self.store.remove_all(&[self.keys.refresh_key.as_str()]).await,
        }
    }

    /// Remove every persisted credential entry
    pub async fn clear(&self) -> Result<()> {
        self.store
            .remove_all(&[
                self.keys.access_key.as_str(),
                self.keys.refresh_key.as_str(),
                self.keys.expiry_key.as_str(),
            ])
            .await
    }
}
