use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::Serialize;

/// An outbound call to the auth service, as a plain value.
///
/// Requests are built by the client, passed through the augmenter (which
/// returns a modified copy), then handed to a `Transport` for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path relative to the service base URL, e.g. `/login`
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl OutboundRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: Method::POST,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Token from the `Authorization: Bearer` header, if attached
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(&AUTHORIZATION)?.strip_prefix("Bearer ")
    }
}

/// Status and raw body of a completed exchange
#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub body: String,
}

impl InboundResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
