//! reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use courier_domain::{constants::DEFAULT_TIMEOUT_MS, HttpMethod, RequestBody, UploadPart};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;
use url::Url;

use super::{Transport, TransportError, WireRequest, WireResponse};
use crate::errors::conversions::classify_http_error;
use crate::errors::InfraError;

/// [`Transport`] backed by a shared reqwest client.
///
/// Sends exactly one request per call. The per-request timeout from
/// [`WireRequest::timeout`] wins over the client-wide default.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    fn build_url(request: &WireRequest) -> Result<Url, TransportError> {
        let mut url = Url::parse(&request.url)
            .map_err(|err| TransportError::InvalidRequest(format!("{}: {err}", request.url)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let url = Self::build_url(&request)?;
        let timeout = request.timeout;
        let method = to_reqwest_method(request.method);

        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        debug!(%method, %url, timeout_ms, "sending HTTP request");

        let mut builder = self.client.request(method.clone(), url.clone()).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
        };

        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            classify_http_error(&err, timeout)
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|err| classify_http_error(&err, timeout))?;

        debug!(%method, %url, status, bytes = body.len(), "received HTTP response");

        Ok(WireResponse { status, headers, body: body.to_vec() })
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

fn multipart_form(parts: Vec<UploadPart>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for upload in parts {
        let mut part = Part::bytes(upload.data);
        if let Some(file_name) = upload.file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = upload.content_type {
            part = part.mime_str(&content_type).map_err(|err| {
                TransportError::InvalidRequest(format!("content type '{content_type}': {err}"))
            })?;
        }
        form = form.part(upload.name, part);
    }
    Ok(form)
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: None,
        }
    }
}

impl HttpTransportBuilder {
    /// Client-wide fallback; individual requests carry their own timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `User-Agent` header sent with every request
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the underlying reqwest client.
    ///
    /// # Errors
    ///
    /// Fails when reqwest cannot initialize its TLS backend.
    pub fn build(self) -> courier_domain::Result<HttpTransport> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(InfraError::from)?;

        Ok(HttpTransport { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::builder().build().expect("transport")
    }

    fn request(method: HttpMethod, url: String) -> WireRequest {
        WireRequest::new(method, url, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn sends_query_headers_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .and(header("authorization", "Bearer abc"))
            .and(body_json(json!({"name": "widget"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut wire = request(HttpMethod::Post, format!("{}/items", server.uri()))
            .with_header("Authorization", "Bearer abc")
            .with_body(RequestBody::Json(json!({"name": "widget"})));
        wire.query.push(("page".into(), "2".into()));

        let response = transport().send(wire).await.expect("response");

        assert_eq!(response.status, 201);
        assert!(response.text().contains("success"));
    }

    #[tokio::test]
    async fn sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("user-agent", "courier-test/1.0"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            HttpTransport::builder().user_agent("courier-test/1.0").build().expect("transport");
        let response = transport
            .send(request(HttpMethod::Get, format!("{}/ping", server.uri())))
            .await
            .expect("response");

        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn returns_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503).insert_header("X-Bypass-Auth", "true").set_body_string("down"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response =
            transport().send(request(HttpMethod::Get, server.uri())).await.expect("response");

        assert_eq!(response.status, 503);
        assert_eq!(response.header("x-bypass-auth"), Some("true"));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let mut wire = request(HttpMethod::Get, server.uri());
        wire.timeout = Duration::from_millis(50);

        let err = transport().send(wire).await.unwrap_err();
        assert_eq!(err, TransportError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let err = transport().send(request(HttpMethod::Get, format!("http://{addr}"))).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_url_is_invalid_request() {
        let err = transport().send(request(HttpMethod::Get, "not a url".into())).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn uploads_multipart_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let wire = request(HttpMethod::Post, format!("{}/upload", server.uri())).with_body(
            RequestBody::Multipart(vec![
                UploadPart::file("file", "report.csv", b"a,b\n1,2\n".to_vec())
                    .with_content_type("text/csv"),
                UploadPart::text("note", "quarterly"),
            ]),
        );

        transport().send(wire).await.expect("response");

        let received = server.received_requests().await.unwrap();
        let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&received[0].body);
        assert!(body.contains("report.csv"));
        assert!(body.contains("quarterly"));
    }
}
