//! Endpoint discovery
//!
//! The client ships with several candidate base URLs (emulator loopback,
//! LAN address, public host). [`ConnectivityResolver`] probes them in order
//! and caches the first that answers. The cache lives until a network-class
//! failure invalidates it.
//!
//! Any HTTP response, whatever its status, proves the host reachable; only a
//! transport failure disqualifies a candidate. When no candidate answers,
//! the first one is cached as *unconfirmed* so requests still have a target
//! and report the real network error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use quill_common::SingleFlight;
use quill_domain::{ClientConfig, QuillError};
use tracing::{debug, info, instrument, warn};

use crate::errors::ClientError;
use crate::transport_ports::{HttpMethod, Transport, TransportRequest};

/// Current resolution state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStatus {
    /// Nothing cached; the next `resolve` probes
    Unresolved,
    /// Cached and known to answer
    Confirmed(String),
    /// Cached as a fallback after every candidate failed
    Unconfirmed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedEndpoint {
    base_url: String,
    confirmed: bool,
}

struct ResolverInner {
    candidates: Vec<String>,
    probe_path: String,
    probe_timeout: Duration,
    transport: Arc<dyn Transport>,
    resolved: RwLock<Option<ResolvedEndpoint>>,
    flight: SingleFlight<String, ClientError>,
    probe_passes: AtomicU64,
}

/// Finds and caches a reachable endpoint
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ConnectivityResolver {
    inner: Arc<ResolverInner>,
}

impl std::fmt::Debug for ConnectivityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityResolver")
            .field("candidates", &self.inner.candidates)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ConnectivityResolver {
    /// Create a resolver over `candidates`, probed in order
    ///
    /// # Errors
    /// Returns `QuillError::Config` when no usable candidate is given.
    pub fn new(
        candidates: Vec<String>,
        probe_path: impl Into<String>,
        probe_timeout: Duration,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, QuillError> {
        let candidates: Vec<String> = candidates
            .into_iter()
            .map(|c| c.trim().trim_end_matches('/').to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if candidates.is_empty() {
            return Err(QuillError::Config("endpoint candidate list must not be empty".into()));
        }

        let probe_path = probe_path.into();
        let probe_path =
            if probe_path.starts_with('/') { probe_path } else { format!("/{probe_path}") };

        Ok(Self {
            inner: Arc::new(ResolverInner {
                candidates,
                probe_path,
                probe_timeout,
                transport,
                resolved: RwLock::new(None),
                flight: SingleFlight::new(),
                probe_passes: AtomicU64::new(0),
            }),
        })
    }

    /// Create a resolver from the client configuration
    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, QuillError> {
        Self::new(
            config.normalized_endpoints(),
            config.normalized_probe_path(),
            config.probe_timeout(),
            transport,
        )
    }

    /// Candidates in probe order
    pub fn candidates(&self) -> &[String] {
        &self.inner.candidates
    }

    /// Base URL to send requests to
    ///
    /// Returns the cached endpoint without probing when one is cached.
    /// Otherwise runs (or joins) a single probe pass.
    pub async fn resolve(&self) -> Result<String, ClientError> {
        if let Some(cached) = self.inner.resolved.read().as_ref() {
            return Ok(cached.base_url.clone());
        }

        let inner = Arc::clone(&self.inner);
        self.inner.flight.run(move || async move { inner.probe_pass().await }).await
    }

    /// Drop the cached endpoint after `endpoint` failed; the next `resolve`
    /// probes from the first candidate
    ///
    /// A failure reported against an endpoint that is no longer cached
    /// leaves the cache alone.
    pub fn invalidate(&self, endpoint: &str) {
        let mut resolved = self.inner.resolved.write();
        match resolved.as_ref() {
            Some(current) if current.base_url == endpoint => {
                info!(endpoint = %endpoint, "Endpoint invalidated");
                *resolved = None;
            }
            Some(current) => {
                debug!(failed = %endpoint, cached = %current.base_url, "Stale failure; cache kept");
            }
            None => {}
        }
    }

    /// Mark `endpoint` confirmed after it produced a live response
    pub fn confirm(&self, endpoint: &str) {
        let mut resolved = self.inner.resolved.write();
        if let Some(current) = resolved.as_mut() {
            if current.base_url == endpoint && !current.confirmed {
                current.confirmed = true;
                info!(endpoint = %endpoint, "Fallback endpoint confirmed by live response");
            }
        }
    }

    pub fn status(&self) -> EndpointStatus {
        match self.inner.resolved.read().as_ref() {
            None => EndpointStatus::Unresolved,
            Some(endpoint) if endpoint.confirmed => {
                EndpointStatus::Confirmed(endpoint.base_url.clone())
            }
            Some(endpoint) => EndpointStatus::Unconfirmed(endpoint.base_url.clone()),
        }
    }

    /// Number of probe passes run so far
    pub fn probe_count(&self) -> u64 {
        self.inner.probe_passes.load(Ordering::SeqCst)
    }
}

impl ResolverInner {
    #[instrument(skip(self), fields(candidates = self.candidates.len()))]
    async fn probe_pass(&self) -> Result<String, ClientError> {
        if let Some(cached) = self.resolved.read().as_ref() {
            return Ok(cached.base_url.clone());
        }
        self.probe_passes.fetch_add(1, Ordering::SeqCst);

        for candidate in &self.candidates {
            let url = format!("{candidate}{}", self.probe_path);
            let request = TransportRequest::new(HttpMethod::Get, url, self.probe_timeout);

            match self.transport.send(request).await {
                Ok(response) => {
                    info!(endpoint = %candidate, status = response.status, "Endpoint selected");
                    self.store(candidate, true);
                    return Ok(candidate.clone());
                }
                Err(failure) => {
                    debug!(endpoint = %candidate, fault = ?failure.fault, "Probe failed");
                }
            }
        }

        let Some(fallback) = self.candidates.first().cloned() else {
            return Err(ClientError::unknown("No endpoint is configured"));
        };
        warn!(endpoint = %fallback, "No endpoint answered; using first candidate unconfirmed");
        self.store(&fallback, false);
        Ok(fallback)
    }

    fn store(&self, base_url: &str, confirmed: bool) {
        *self.resolved.write() = Some(ResolvedEndpoint { base_url: base_url.to_string(), confirmed });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::transport_ports::{FaultKind, TransportFailure, TransportResponse};

    /// Answers for hosts in `up`, refuses everything else
    struct ProbeTransport {
        up: Mutex<HashSet<String>>,
        delay: Duration,
        sent: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ProbeTransport {
        fn new(up: &[&str]) -> Arc<Self> {
            Self::slow(up, Duration::ZERO)
        }

        fn slow(up: &[&str], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                up: Mutex::new(up.iter().map(ToString::to_string).collect()),
                delay,
                sent: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn set_up(&self, up: &[&str]) {
            *self.up.lock() = up.iter().map(ToString::to_string).collect();
        }
    }

    #[async_trait]
    impl Transport for ProbeTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().push(request.url.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let host_up = self.up.lock().iter().any(|host| request.url.starts_with(host.as_str()));
            if host_up {
                Ok(TransportResponse::new(404, "not here"))
            } else {
                Err(TransportFailure::new(FaultKind::Refused, "connection refused"))
            }
        }
    }

    fn resolver(transport: Arc<ProbeTransport>) -> ConnectivityResolver {
        ConnectivityResolver::new(
            vec!["http://a.test/".into(), "http://b.test".into(), "http://c.test".into()],
            "health",
            Duration::from_millis(100),
            transport,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_candidates() {
        let result = ConnectivityResolver::new(
            vec![" ".into()],
            "/",
            Duration::from_secs(1),
            ProbeTransport::new(&[]),
        );
        assert!(matches!(result, Err(QuillError::Config(_))));
    }

    #[tokio::test]
    async fn test_first_reachable_candidate_wins_and_is_cached() {
        let transport = ProbeTransport::new(&["http://c.test"]);
        let resolver = resolver(Arc::clone(&transport));

        assert_eq!(resolver.resolve().await.unwrap(), "http://c.test");
        assert_eq!(resolver.status(), EndpointStatus::Confirmed("http://c.test".into()));
        assert_eq!(
            *transport.sent.lock(),
            vec!["http://a.test/health", "http://b.test/health", "http://c.test/health"]
        );

        // Cached: no further probes
        assert_eq!(resolver.resolve().await.unwrap(), "http://c.test");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_all_fail_falls_back_to_first_unconfirmed() {
        let transport = ProbeTransport::new(&[]);
        let resolver = resolver(Arc::clone(&transport));

        assert_eq!(resolver.resolve().await.unwrap(), "http://a.test");
        assert_eq!(resolver.status(), EndpointStatus::Unconfirmed("http://a.test".into()));

        resolver.confirm("http://b.test");
        assert_eq!(resolver.status(), EndpointStatus::Unconfirmed("http://a.test".into()));
        resolver.confirm("http://a.test");
        assert_eq!(resolver.status(), EndpointStatus::Confirmed("http://a.test".into()));
    }

    #[tokio::test]
    async fn test_invalidate_reprobes_from_first_candidate() {
        let transport = ProbeTransport::new(&["http://b.test"]);
        let resolver = resolver(Arc::clone(&transport));
        assert_eq!(resolver.resolve().await.unwrap(), "http://b.test");

        transport.set_up(&["http://a.test", "http://b.test"]);
        resolver.invalidate("http://b.test");
        assert_eq!(resolver.status(), EndpointStatus::Unresolved);

        assert_eq!(resolver.resolve().await.unwrap(), "http://a.test");
        assert_eq!(resolver.probe_count(), 2);
    }

    #[tokio::test]
    async fn test_late_failure_from_previous_endpoint_keeps_cache() {
        let transport = ProbeTransport::new(&["http://b.test"]);
        let resolver = resolver(Arc::clone(&transport));
        assert_eq!(resolver.resolve().await.unwrap(), "http://b.test");

        resolver.invalidate("http://a.test");
        assert_eq!(resolver.status(), EndpointStatus::Confirmed("http://b.test".into()));
        assert_eq!(resolver.resolve().await.unwrap(), "http://b.test");
        assert_eq!(resolver.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_probe_pass() {
        let transport = ProbeTransport::slow(&["http://b.test"], Duration::from_millis(20));
        let resolver = resolver(Arc::clone(&transport));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move { resolver.resolve().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "http://b.test");
        }

        assert_eq!(resolver.probe_count(), 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
