//! Logical requests and responses
//!
//! An [`ApiRequest`] names a backend operation relative to whichever
//! endpoint is resolved at send time. It also records whether the
//! operation may safely be repeated and whether it needs the credential.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ClientError;
use crate::transport_ports::HttpMethod;

/// A backend call, independent of endpoint and credential
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    authenticated: bool,
    idempotent: bool,
}

impl ApiRequest {
    /// New request; idempotency defaults from the method (only POST is not)
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') { path } else { format!("/{path}") };
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
            authenticated: true,
            idempotent: method.is_idempotent(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Append several query parameters
    #[must_use]
    pub fn query_pairs<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query.extend(pairs);
        self
    }

    /// Attach a JSON body
    ///
    /// # Errors
    /// Returns an `Unknown` error if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body).map_err(|err| {
            ClientError::unknown(format!("Request body could not be encoded: {err}"))
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Send without the credential even if one is held
    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Override whether the request may be retried
    #[must_use]
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub const fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Path plus percent-encoded query string
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }

    /// Absolute URL against `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path_and_query())
    }
}

/// A successful backend response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Whether the response carries no content
    pub fn is_empty(&self) -> bool {
        matches!(self.status, 204 | 205) || self.body.trim().is_empty()
    }

    /// Decode the body as JSON; empty responses decode from `null`
    ///
    /// # Errors
    /// Returns an `Unknown` error carrying the status when the body does not
    /// match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let decoded = if self.is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_str(&self.body)
        };
        decoded.map_err(|err| {
            tracing::debug!(status = self.status, error = %err, "Response body did not decode");
            ClientError::unknown("Unexpected response from the server").with_status(self.status)
        })
    }
}

#[cfg(test)]
mod tests {
    use quill_domain::Post;

    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_idempotency_defaults() {
        assert!(ApiRequest::get("/posts").is_idempotent());
        assert!(ApiRequest::put("/posts/1").is_idempotent());
        assert!(ApiRequest::patch("/posts/1").is_idempotent());
        assert!(ApiRequest::delete("/posts/1").is_idempotent());
        assert!(!ApiRequest::post("/posts").is_idempotent());
        assert!(ApiRequest::post("/auth/refresh").idempotent(true).is_idempotent());
    }

    #[test]
    fn test_url_building_encodes_query() {
        let request = ApiRequest::get("posts/search").query("q", "café & té").query("page", 2);
        assert_eq!(request.path(), "/posts/search");
        assert_eq!(
            request.url("http://a.test/"),
            "http://a.test/posts/search?q=caf%C3%A9%20%26%20t%C3%A9&page=2"
        );
    }

    #[test]
    fn test_json_body_and_flags() {
        let request = ApiRequest::post("/auth/login")
            .json(&serde_json::json!({ "email": "a@b.c" }))
            .unwrap()
            .unauthenticated();
        assert!(!request.is_authenticated());
        assert_eq!(request.body(), Some(&serde_json::json!({ "email": "a@b.c" })));
    }

    #[test]
    fn test_empty_responses_decode_as_null() {
        let no_content = ApiResponse { status: 204, body: String::new() };
        no_content.json::<()>().unwrap();
        let option: Option<Post> = no_content.json().unwrap();
        assert!(option.is_none());

        let blank = ApiResponse { status: 200, body: "  ".into() };
        assert!(blank.is_empty());
    }

    #[test]
    fn test_decode_failure_is_unknown() {
        let response = ApiResponse { status: 200, body: "[1,2]".into() };
        let err = response.json::<Post>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.http_status(), Some(200));
    }
}
