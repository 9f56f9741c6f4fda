//! Shared test helpers for `quill-core` integration tests.
//!
//! A scripted transport and refresher so pipeline tests can describe the
//! network as a function of the outgoing request.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use quill_core::{
    ClientError, ConnectivityResolver, Credential, CredentialManager, CredentialRefresher,
    CredentialStore, FaultKind, InMemoryStore, RequestPipeline, Transport, TransportFailure,
    TransportRequest, TransportResponse,
};
use quill_domain::ClientConfig;

pub const HOST_A: &str = "http://a.test";
pub const HOST_B: &str = "http://b.test";
pub const HOST_C: &str = "http://c.test";
pub const PROBE_PATH: &str = "/health";

type Script = dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportFailure> + Send + Sync;

/// Transport whose answers come from a replaceable script
pub struct ScriptedTransport {
    script: Mutex<Arc<Script>>,
    delay: Duration,
    sent: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    {
        Self::with_delay(Duration::ZERO, script)
    }

    pub fn with_delay<F>(delay: Duration, script: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self { script: Mutex::new(Arc::new(script)), delay, sent: Mutex::new(Vec::new()) })
    }

    pub fn rescript<F>(&self, script: F)
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    {
        *self.script.lock() = Arc::new(script);
    }

    pub fn sent(&self) -> Vec<TransportRequest> {
        self.sent.lock().clone()
    }

    /// Requests that were probes
    pub fn probes(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|request| request.url.ends_with(PROBE_PATH))
            .map(|request| request.url.clone())
            .collect()
    }

    /// Requests that were not probes
    pub fn calls(&self) -> Vec<TransportRequest> {
        self.sent.lock().iter().filter(|request| !request.url.ends_with(PROBE_PATH)).cloned().collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        self.sent.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let script = Arc::clone(&self.script.lock());
        script(&request)
    }
}

pub fn refused() -> TransportFailure {
    TransportFailure::new(FaultKind::Refused, "connection refused")
}

pub fn ok(body: &str) -> Result<TransportResponse, TransportFailure> {
    Ok(TransportResponse::new(200, body))
}

pub fn status(status: u16, body: &str) -> Result<TransportResponse, TransportFailure> {
    Ok(TransportResponse::new(status, body))
}

/// Refresher that counts calls and returns a fixed outcome after `delay`
pub struct ScriptedRefresher {
    outcome: Result<String, ClientError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    pub fn issuing(access_secret: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self { outcome: Ok(access_secret.to_string()), delay, calls: AtomicUsize::new(0) })
    }

    pub fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(ClientError::auth("Invalid refresh token").with_status(401)),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_secret: &str) -> Result<Credential, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let access = self.outcome.clone()?;
        Ok(Credential::new(
            access,
            Utc::now() + ChronoDuration::hours(1),
            Some(refresh_secret.to_string()),
        ))
    }
}

pub fn valid_credential(access: &str) -> Credential {
    Credential::new(access, Utc::now() + ChronoDuration::hours(1), Some("refresh-1".into()))
}

pub fn expired_credential(access: &str) -> Credential {
    Credential::new(access, Utc::now() - ChronoDuration::minutes(5), Some("refresh-1".into()))
}

/// Configuration over the three test hosts with fast, jitter-free retry
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::with_endpoints([HOST_A, HOST_B, HOST_C]);
    config.probe_path = PROBE_PATH.to_string();
    config.retry.base_delay_ms = 100;
    config.retry.backoff_multiplier = 2.0;
    config.retry.max_delay_ms = 1_000;
    config.retry.jitter = false;
    config
}

pub struct Harness {
    pub pipeline: RequestPipeline,
    pub transport: Arc<ScriptedTransport>,
    pub refresher: Arc<ScriptedRefresher>,
    pub store: Arc<InMemoryStore>,
}

impl Harness {
    pub async fn build(
        config: &ClientConfig,
        transport: Arc<ScriptedTransport>,
        refresher: Arc<ScriptedRefresher>,
        credential: Option<Credential>,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let credentials = CredentialManager::new(
            CredentialStore::new(store.clone(), config.storage.clone()),
            refresher.clone(),
            &config.auth,
        );
        if let Some(credential) = credential {
            credentials.install(credential).await.unwrap();
        }
        let resolver = ConnectivityResolver::from_config(config, transport.clone()).unwrap();
        let pipeline =
            RequestPipeline::new(config, transport.clone(), resolver, credentials).unwrap();
        Self { pipeline, transport, refresher, store }
    }
}
