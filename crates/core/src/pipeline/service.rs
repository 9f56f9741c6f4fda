//! The request pipeline
//!
//! Every backend call goes through [`RequestPipeline::execute`]:
//!
//! 1. resolve the endpoint (cached, or a single shared probe pass)
//! 2. build the wire request and attach the credential when required
//! 3. send; a network-class failure invalidates the endpoint
//! 4. on 401 with a credential attached, refresh once and replay once; a
//!    second 401, or a 401 on a credential refreshed just before sending,
//!    ends the session
//! 5. retry retryable failures with backoff, idempotent requests only
//!
//! One pipeline is created per application session and shared by `Arc`.

use std::sync::Arc;
use std::time::Duration;

use quill_common::{policies::ClassifiedRetry, RetryConfig, RetryExecutor};
use quill_domain::{ClientConfig, QuillError};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::request::{ApiRequest, ApiResponse};
use crate::auth::CredentialManager;
use crate::connectivity::ConnectivityResolver;
use crate::errors::{normalize, ClientError, RawFailure};
use crate::transport_ports::{Transport, TransportRequest, TransportResponse};

/// Resilient request execution over a [`Transport`]
pub struct RequestPipeline {
    retry: RetryConfig,
    request_timeout: Duration,
    transport: Arc<dyn Transport>,
    resolver: ConnectivityResolver,
    credentials: CredentialManager,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    /// Assemble a pipeline
    ///
    /// # Errors
    /// Returns `QuillError::Config` when the retry settings are invalid.
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        resolver: ConnectivityResolver,
        credentials: CredentialManager,
    ) -> Result<Self, QuillError> {
        let settings = &config.retry;
        let builder = RetryConfig::builder()
            .max_attempts(settings.max_attempts)
            .exponential_backoff(
                settings.base_delay(),
                settings.backoff_multiplier,
                settings.max_delay(),
            );
        let builder = if settings.jitter { builder.additive_jitter(0.2) } else { builder.no_jitter() };
        let retry = builder.build().map_err(|err| QuillError::Config(err.to_string()))?;

        Ok(Self {
            retry,
            request_timeout: config.request_timeout(),
            transport,
            resolver,
            credentials,
        })
    }

    pub fn resolver(&self) -> &ConnectivityResolver {
        &self.resolver
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Execute `request`, retrying per policy
    ///
    /// # Errors
    /// Returns the normalized error of the last attempt.
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.path(), idempotent = request.is_idempotent())
    )]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let config = self.retry.clone().with_idempotent(request.is_idempotent());
        let executor = RetryExecutor::new(config, ClassifiedRetry);

        let result = executor.execute(|| self.attempt(&request)).await;
        if let Err(err) = &result {
            debug!(kind = %err.kind(), status = ?err.http_status(), "Request failed");
        }
        result
    }

    /// Execute `request` and decode the JSON body
    ///
    /// 204/205 and empty bodies decode from `null`.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        self.execute(request).await?.json()
    }

    /// One attempt, including at most one refresh-and-replay
    async fn attempt(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let endpoint = self.resolver.resolve().await?;

        let mut wire = TransportRequest::new(
            request.method(),
            request.url(&endpoint),
            self.request_timeout,
        )
        .with_header("Accept", "application/json");
        if let Some(body) = request.body() {
            wire = wire.with_header("Content-Type", "application/json").with_body(body.clone());
        }

        let attached = if request.is_authenticated() {
            self.credentials.authorize(&mut wire).await?
        } else {
            None
        };

        let response = self.send(&endpoint, wire.clone()).await?;
        if response.is_success() {
            return Ok(into_api_response(response));
        }

        let error = normalize(RawFailure::from(response));
        let Some(rejected) = attached.filter(|_| error.is_auth()) else {
            return Err(error);
        };
        if rejected.refreshed {
            warn!("Freshly refreshed credential rejected");
            self.credentials.on_terminal_auth_failure().await;
            return Err(error);
        }

        debug!("Credential rejected; refreshing and replaying once");
        let fresh = self.credentials.refresh_after_rejection(&rejected.secret).await?;
        wire.set_bearer(&fresh);

        let replay = self.send(&endpoint, wire).await?;
        if replay.is_success() {
            return Ok(into_api_response(replay));
        }

        let error = normalize(RawFailure::from(replay));
        if error.is_auth() {
            warn!("Refreshed credential rejected");
            self.credentials.on_terminal_auth_failure().await;
        }
        Err(error)
    }

    /// Send over the transport, keeping the endpoint cache honest
    async fn send(
        &self,
        endpoint: &str,
        wire: TransportRequest,
    ) -> Result<TransportResponse, ClientError> {
        match self.transport.send(wire).await {
            Ok(response) => {
                self.resolver.confirm(endpoint);
                Ok(response)
            }
            Err(failure) => {
                let error = normalize(RawFailure::from(failure));
                if error.is_network_class() {
                    warn!(endpoint = %endpoint, kind = %error.kind(), "Endpoint unreachable");
                    self.resolver.invalidate(endpoint);
                }
                Err(error)
            }
        }
    }
}

fn into_api_response(response: TransportResponse) -> ApiResponse {
    ApiResponse { status: response.status, body: response.body }
}
