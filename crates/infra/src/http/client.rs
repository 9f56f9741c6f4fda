use std::time::Duration;

use async_trait::async_trait;
use quill_core::{HttpMethod, Transport, TransportFailure, TransportRequest, TransportResponse};
use quill_domain::constants::DEFAULT_REQUEST_TIMEOUT_MS;
use quill_domain::QuillError;
use reqwest::{Client as ReqwestClient, Method};
use tracing::{debug, instrument};

use crate::errors::{transport_failure, InfraError};

/// [`Transport`] backed by a shared `reqwest` client.
///
/// Sends exactly once. Retry, endpoint selection and credentials are the
/// pipeline's job; responses of every status are returned as-is.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, QuillError> {
        Self::builder().build()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let mut builder =
            self.client.request(to_reqwest_method(request.method), &request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            let failure = transport_failure(&err);
            debug!(fault = ?failure.fault, error = %failure.detail, "HTTP request failed");
            failure
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            let failure = transport_failure(&err);
            debug!(status, fault = ?failure.fault, "HTTP response body interrupted");
            failure
        })?;

        debug!(status, bytes = body.len(), "received HTTP response");
        Ok(TransportResponse::new(status, body))
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
    accept_invalid_certs: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: None,
            user_agent: None,
            default_headers: None,
            accept_invalid_certs: false,
        }
    }
}

impl HttpTransportBuilder {
    /// Client-wide ceiling; each request also carries its own timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<HttpTransport, QuillError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            QuillError::from(infra)
        })?;

        Ok(HttpTransport { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use quill_core::FaultKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::builder().timeout(Duration::from_secs(5)).build().expect("http transport")
    }

    fn request(method: HttpMethod, url: String) -> TransportRequest {
        TransportRequest::new(method, url, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn sends_headers_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(header("authorization", "Bearer abc"))
            .and(body_json(json!({ "title": "Hola" })))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut outgoing = request(HttpMethod::Post, format!("{}/posts", server.uri()))
            .with_body(json!({ "title": "Hola" }));
        outgoing.set_bearer("abc");

        let response = transport().send(outgoing).await.expect("response");
        assert_eq!(response.status, 201);
        assert_eq!(response.body, r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn returns_error_statuses_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(1)
            .mount(&server)
            .await;

        let response =
            transport().send(request(HttpMethod::Get, server.uri())).await.expect("response");

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn closed_port_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let failure =
            transport().send(request(HttpMethod::Get, format!("http://{addr}"))).await.unwrap_err();
        assert_eq!(failure.fault, FaultKind::Refused);
    }

    #[tokio::test]
    async fn per_request_timeout_applies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let outgoing = TransportRequest::new(HttpMethod::Get, server.uri(), Duration::from_millis(50));
        let failure = transport().send(outgoing).await.unwrap_err();
        assert_eq!(failure.fault, FaultKind::TimedOut);
    }
}
