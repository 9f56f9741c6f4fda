//! Authentication endpoints
//!
//! [`AuthService`] signs in, registers and signs out through the pipeline.
//! [`HttpCredentialRefresher`] performs the refresh exchange for the
//! credential manager. It talks to the transport directly: a refresh must
//! never attach a credential, trigger another refresh, or be retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use quill_core::{
    normalize, ApiRequest, ClientError, ConnectivityResolver, Credential, CredentialManager,
    CredentialRefresher, HttpMethod, RawFailure, RequestPipeline, Transport, TransportRequest,
};
use quill_domain::{AuthSession, LoginRequest, RegisterRequest};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

/// Sign-in, registration and sign-out
#[derive(Clone)]
pub struct AuthService {
    pipeline: Arc<RequestPipeline>,
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        pipeline: Arc<RequestPipeline>,
        transport: Arc<dyn Transport>,
        request_timeout: Duration,
    ) -> Self {
        Self { pipeline, transport, request_timeout }
    }

    fn credentials(&self) -> &CredentialManager {
        self.pipeline.credentials()
    }

    /// Sign in and install the issued credential
    ///
    /// Attempted once; credentials are never sent twice.
    #[instrument(skip_all)]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ClientError> {
        let call = ApiRequest::post("/auth/login").json(request)?.unauthenticated();
        let session: AuthSession = self.pipeline.execute_json(call).await?;
        self.install(&session).await;
        info!("Signed in");
        Ok(session)
    }

    /// Create an account and install the issued credential
    #[instrument(skip_all)]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ClientError> {
        let call = ApiRequest::post("/auth/register").json(request)?.unauthenticated();
        let session: AuthSession = self.pipeline.execute_json(call).await?;
        self.install(&session).await;
        info!("Registered and signed in");
        Ok(session)
    }

    /// Sign out
    ///
    /// Tells the backend on a best-effort basis, then always clears the
    /// local credential. The session observer is not notified.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        if let Some(credential) = self.credentials().snapshot().await {
            if let Err(err) = self.revoke(&credential).await {
                debug!(kind = %err.kind(), "Backend sign-out failed; clearing locally");
            }
        }
        self.credentials().clear().await;
        info!("Signed out");
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials().is_authenticated().await
    }

    async fn install(&self, session: &AuthSession) {
        let credential = Credential::from_session(session, Utc::now(), None);
        if let Err(err) = self.credentials().install(credential).await {
            warn!(error = %err, "Credential not persisted; session lasts until restart");
        }
    }

    /// `POST /auth/logout` sent directly, so a rejection cannot start a
    /// refresh or end the session through the observer
    async fn revoke(&self, credential: &Credential) -> Result<(), ClientError> {
        let endpoint = self.pipeline.resolver().resolve().await?;
        let body = match credential.refresh_secret() {
            Some(refresh) => json!({ "refreshToken": refresh }),
            None => json!({}),
        };
        let mut request = TransportRequest::new(
            HttpMethod::Post,
            ApiRequest::post("/auth/logout").url(&endpoint),
            self.request_timeout,
        )
        .with_header("Accept", "application/json")
        .with_header("Content-Type", "application/json")
        .with_body(body);
        request.set_bearer(credential.access_secret());

        let response = self.transport.send(request).await.map_err(|failure| normalize(RawFailure::from(failure)))?;
        if response.is_success() {
            Ok(())
        } else {
            Err(normalize(RawFailure::from(response)))
        }
    }
}

/// Exchanges a refresh secret at `POST /auth/refresh`
pub struct HttpCredentialRefresher {
    resolver: ConnectivityResolver,
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
}

impl HttpCredentialRefresher {
    pub fn new(
        resolver: ConnectivityResolver,
        transport: Arc<dyn Transport>,
        request_timeout: Duration,
    ) -> Self {
        Self { resolver, transport, request_timeout }
    }
}

#[async_trait]
impl CredentialRefresher for HttpCredentialRefresher {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_secret: &str) -> Result<Credential, ClientError> {
        let endpoint = self.resolver.resolve().await?;
        let request = TransportRequest::new(
            HttpMethod::Post,
            ApiRequest::post("/auth/refresh").url(&endpoint),
            self.request_timeout,
        )
        .with_header("Accept", "application/json")
        .with_header("Content-Type", "application/json")
        .with_body(json!({ "refreshToken": refresh_secret }));

        let response = match self.transport.send(request).await {
            Ok(response) => {
                self.resolver.confirm(&endpoint);
                response
            }
            Err(failure) => {
                let error = normalize(RawFailure::from(failure));
                if error.is_network_class() {
                    self.resolver.invalidate(&endpoint);
                }
                return Err(error);
            }
        };

        if !response.is_success() {
            return Err(normalize(RawFailure::from(response)));
        }

        let session: AuthSession = serde_json::from_str(&response.body).map_err(|err| {
            debug!(error = %err, "Refresh response did not decode");
            ClientError::unknown("Unexpected response from the server").with_status(response.status)
        })?;
        debug!("Credential refreshed");
        Ok(Credential::from_session(&session, Utc::now(), Some(refresh_secret)))
    }
}
