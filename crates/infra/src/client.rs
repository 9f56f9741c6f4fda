//! Client assembly
//!
//! [`QuillClient`] wires the transport, endpoint resolver, credential
//! manager and pipeline into the outward API. Build it once per
//! application session and share it.

use std::sync::Arc;

use quill_core::{
    ConnectivityResolver, CredentialManager, CredentialState, CredentialStore, KeyValueStore,
    RequestPipeline, SessionObserver, Transport,
};
use quill_domain::{ClientConfig, QuillError};
use tracing::info;

use crate::api::{AuthService, ContentApi, HttpCredentialRefresher};
use crate::http::HttpTransport;
use crate::storage::KeychainStore;

/// The assembled client
#[derive(Debug, Clone)]
pub struct QuillClient {
    pipeline: Arc<RequestPipeline>,
    content: ContentApi,
    auth: AuthService,
}

impl QuillClient {
    /// Create a builder for fluent configuration
    pub fn builder(config: ClientConfig) -> QuillClientBuilder {
        QuillClientBuilder::new(config)
    }

    pub fn content(&self) -> &ContentApi {
        &self.content
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// Register the callback run when the session ends involuntarily
    pub fn on_session_expired(&self, observer: Arc<dyn SessionObserver>) {
        self.pipeline.credentials().set_session_observer(observer);
    }
}

/// Builder for [`QuillClient`]
///
/// Defaults to [`HttpTransport`] and a [`KeychainStore`] under the
/// configured service name.
pub struct QuillClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl QuillClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, transport: None, store: None }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration, assemble the client and load any
    /// persisted credential
    ///
    /// # Errors
    /// Returns `QuillError::Config` for invalid configuration and
    /// `QuillError::Network` if the default transport cannot be built.
    pub async fn build(self) -> Result<QuillClient, QuillError> {
        let config = self.config;
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::builder().timeout(config.request_timeout()).build()?),
        };
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(KeychainStore::for_service(config.storage.service_name.clone())),
        };

        let resolver = ConnectivityResolver::from_config(&config, Arc::clone(&transport))?;
        let refresher = Arc::new(HttpCredentialRefresher::new(
            resolver.clone(),
            Arc::clone(&transport),
            config.request_timeout(),
        ));
        let credentials = CredentialManager::new(
            CredentialStore::new(store, config.storage.clone()),
            refresher,
            &config.auth,
        );
        let state = credentials.initialize().await;

        let pipeline =
            Arc::new(RequestPipeline::new(&config, Arc::clone(&transport), resolver, credentials)?);
        info!(
            candidates = config.normalized_endpoints().len(),
            signed_in = state != CredentialState::Absent,
            "Quill client ready"
        );

        Ok(QuillClient {
            content: ContentApi::new(Arc::clone(&pipeline)),
            auth: AuthService::new(Arc::clone(&pipeline), transport, config.request_timeout()),
            pipeline,
        })
    }
}
