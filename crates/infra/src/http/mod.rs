//! Transport boundary
//!
//! The pipeline talks to the network only through [`Transport`]. A call
//! either yields a [`WireResponse`] (any status code) or a
//! [`TransportError`] when no response arrived at all.

pub mod client;

use std::time::Duration;

use async_trait::async_trait;
use courier_common::error::{ErrorClassification, ErrorSeverity};
use courier_domain::{HttpMethod, RequestBody};
use thiserror::Error;

pub use client::{HttpTransport, HttpTransportBuilder};

/// Failure to obtain any response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed or was reset
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Request was canceled before a response arrived
    #[error("Request aborted")]
    Aborted,

    /// Request could not be built (bad URL, bad header)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ErrorClassification for TransportError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network(_) | Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Aborted => ErrorSeverity::Info,
            Self::InvalidRequest(_) => ErrorSeverity::Error,
        }
    }
}

/// Fully resolved outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL without query string
    pub url: String,
    /// Query pairs, in send order
    pub query: Vec<(String, String)>,
    /// Headers, in send order
    pub headers: Vec<(String, String)>,
    /// Payload
    pub body: RequestBody,
    /// Per-request timeout
    pub timeout: Duration,
}

impl WireRequest {
    /// Request with no query, headers or body
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout,
        }
    }

    /// Set a header, replacing any existing value (names compare case-insensitively).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Builder form of [`set_header`](Self::set_header)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the payload
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// First value of query parameter `name`
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// URL path relative to the origin, for logs and test matching
    pub fn path(&self) -> &str {
        let after_scheme = self.url.split_once("://").map_or(self.url.as_str(), |(_, rest)| rest);
        after_scheme.find('/').map_or("/", |idx| &after_scheme[idx..])
    }
}

/// Status, headers and raw body of a received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP status code
    pub status: u16,
    /// Header names are lower-cased
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl WireResponse {
    /// Response with no headers
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// JSON body with the matching content type
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string()).with_header("content-type", "application/json")
    }

    /// Append a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 5xx status
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Body as text, lossy for invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Sends one request and returns whatever the server answered.
///
/// Implementations must not retry, refresh credentials or interpret the
/// body; all of that belongs to the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}
