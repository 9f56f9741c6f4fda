//! Port interfaces for credential refresh
//!
//! The manager does not know how a refresh is performed. `quill-infra`
//! implements [`CredentialRefresher`] against `/auth/refresh`, outside the
//! request pipeline so a refresh never triggers another refresh.

use async_trait::async_trait;

use super::credential::Credential;
use crate::errors::ClientError;

/// Exchanges a refresh secret for a new credential
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self, refresh_secret: &str) -> Result<Credential, ClientError>;
}
