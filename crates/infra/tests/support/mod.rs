//! Shared helpers for `quill-infra` integration tests.

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use chrono::{Duration as ChronoDuration, Utc};
use quill_core::InMemoryStore;
use quill_domain::ClientConfig;
use quill_infra::QuillClient;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness writer
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("quill_core=debug,quill_infra=debug,warn"))
            .with_test_writer()
            .try_init();
    });
}

/// URL of a local port nothing listens on, so connections are refused
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener); // release the port so that requests fail with ECONNREFUSED
    format!("http://{addr}")
}

/// Fast, jitter-free configuration over `endpoints`
pub fn test_config(endpoints: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::with_endpoints(endpoints.iter().copied());
    config.probe_path = "/health".to_string();
    config.probe_timeout_ms = 500;
    config.request_timeout_ms = 2_000;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.retry.jitter = false;
    config
}

/// Store pre-seeded with a credential expiring `expires_in_minutes` from now
pub fn seeded_store(access: &str, refresh: &str, expires_in_minutes: i64) -> Arc<InMemoryStore> {
    let expiry = (Utc::now() + ChronoDuration::minutes(expires_in_minutes)).to_rfc3339();
    Arc::new(InMemoryStore::with_entries([
        ("access_token", access.to_string()),
        ("refresh_token", refresh.to_string()),
        ("token_expiry", expiry),
    ]))
}

pub async fn build_client(config: ClientConfig, store: Arc<InMemoryStore>) -> QuillClient {
    init_test_tracing();
    QuillClient::builder(config).store(store).build().await.expect("client should build")
}

/// Register an observer that counts session-expiry notifications
pub fn count_expiries(client: &QuillClient) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    client.on_session_expired(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    count
}
