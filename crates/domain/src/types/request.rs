//! Request descriptors and cache fingerprints

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods the client issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Read; the only cacheable method
    Get,
    /// Create
    Post,
    /// Replace
    Put,
    /// Partial update
    Patch,
    /// Remove
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Only read-only requests are eligible for the response cache.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Get)
    }

    /// Methods whose structured bodies must go out as JSON.
    pub fn mutates_state(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    /// Form field name
    pub name: String,
    /// File name reported to the server; `None` for text fields
    pub file_name: Option<String>,
    /// MIME type; reqwest's default when `None`
    pub content_type: Option<String>,
    /// Raw part contents
    pub data: Vec<u8>,
}

impl UploadPart {
    /// File part with a client-side file name
    pub fn file(name: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self { name: name.into(), file_name: Some(file_name.into()), content_type: None, data }
    }

    /// Plain text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: value.into().into_bytes(),
        }
    }

    /// Set an explicit MIME type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Structured data, always sent as `application/json`
    Json(Value),
    /// URL-encoded form fields
    Form(Vec<(String, String)>),
    /// `multipart/form-data` upload
    Multipart(Vec<UploadPart>),
}

impl RequestBody {
    /// Arrays and objects; these must never be re-encoded as form fields.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Json(Value::Array(_) | Value::Object(_)))
    }

    /// Multipart bodies get the upload timeout
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// Stable textual form used in fingerprints and request logs.
    pub fn canonical(&self) -> String {
        match self {
            Self::Empty => "null".to_string(),
            Self::Json(value) => value.to_string(),
            Self::Form(fields) => {
                let map: BTreeMap<&str, &str> =
                    fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                serde_json::to_string(&map).unwrap_or_default()
            }
            Self::Multipart(parts) => {
                let summary: Vec<String> = parts
                    .iter()
                    .map(|p| format!("{}:{}:{}", p.name, p.file_name.as_deref().unwrap_or(""), p.data.len()))
                    .collect();
                format!("multipart[{}]", summary.join(","))
            }
        }
    }
}

/// Per-request behaviour flags
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Hold a loading indicator for the duration of the request
    pub show_loading: bool,
    /// Serve from / populate the response cache (GET only)
    pub use_cache: bool,
    /// Remaining retries for transport and 5xx failures
    pub retry_budget: u32,
    /// Delay before the next retry; doubles on every derived retry.
    /// The client's configured default applies when `None`.
    pub retry_delay: Option<Duration>,
    /// TTL for a cached response; config default when `None`
    pub cache_ttl: Option<Duration>,
    /// Drop all cached reads after this request succeeds
    pub invalidate_cache: bool,
    /// Transport timeout override
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            show_loading: true,
            use_cache: false,
            retry_budget: 0,
            retry_delay: None,
            cache_ttl: None,
            invalidate_cache: false,
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Use the response cache with the configured default TTL
    pub fn cached(mut self) -> Self {
        self.use_cache = true;
        self
    }

    /// Use the response cache with a specific TTL
    pub fn cached_for(mut self, ttl: Duration) -> Self {
        self.use_cache = true;
        self.cache_ttl = Some(ttl);
        self
    }

    /// Allow `budget` retries, the first after `initial_delay`
    pub fn retries(mut self, budget: u32, initial_delay: Duration) -> Self {
        self.retry_budget = budget;
        self.retry_delay = Some(initial_delay);
        self
    }

    /// No loading indicator
    pub fn silent(mut self) -> Self {
        self.show_loading = false;
        self
    }

    /// Clear the response cache once this request succeeds
    pub fn invalidating_cache(mut self) -> Self {
        self.invalidate_cache = true;
        self
    }

    /// Override the transport timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Everything needed to issue (and re-issue) one logical request.
///
/// Descriptors are not mutated once dispatched; retries work on a
/// [`derive_retry`](Self::derive_retry) copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    /// Query parameters, kept sorted for stable fingerprints
    pub query: BTreeMap<String, Value>,
    /// Request payload
    pub body: RequestBody,
    /// Extra headers; the client adds auth, trace and content-type headers
    pub headers: BTreeMap<String, String>,
    /// Caching, retry and loading behaviour
    pub options: RequestOptions,
}

impl RequestDescriptor {
    /// Descriptor with default options and no body
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: RequestBody::Empty,
            headers: BTreeMap::new(),
            options: RequestOptions::default(),
        }
    }

    /// GET with no body
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(RequestBody::Json(body))
    }

    /// PUT with a JSON body
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(RequestBody::Json(body))
    }

    /// PATCH with a JSON body
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path).with_body(RequestBody::Json(body))
    }

    /// DELETE with no body
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Multipart POST
    pub fn upload(path: impl Into<String>, parts: Vec<UploadPart>) -> Self {
        Self::new(HttpMethod::Post, path).with_body(RequestBody::Multipart(parts))
    }

    /// Replace the body
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set one query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Merge an object of query parameters; non-object values are ignored.
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.query.extend(map);
        }
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the options
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether this descriptor reads from and writes to the response cache.
    pub fn is_cacheable(&self) -> bool {
        self.options.use_cache && self.method.is_read_only()
    }

    /// Copy for the next retry: one less retry, twice the delay.
    pub fn derive_retry(&self) -> Self {
        let mut next = self.clone();
        next.options.retry_budget = self.options.retry_budget.saturating_sub(1);
        next.options.retry_delay = self.options.retry_delay.map(|delay| delay.saturating_mul(2));
        next
    }

    /// Query parameters as wire pairs.
    ///
    /// Strings go out verbatim, scalars via their JSON text, arrays as
    /// repeated keys and nested objects as JSON. Nulls are omitted.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.query.len());
        for (key, value) in &self.query {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    pairs.extend(items.iter().filter_map(|v| scalar_text(v).map(|t| (key.clone(), t))));
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
        }
        pairs
    }

    /// Cache key for this request.
    ///
    /// `cache_bust_param` names the volatile parameter that must not
    /// influence the key even if present in `query`.
    pub fn fingerprint(&self, cache_bust_param: &str) -> RequestFingerprint {
        let params: BTreeMap<&str, &Value> = self
            .query
            .iter()
            .filter(|(key, _)| key.as_str() != cache_bust_param)
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        let params = serde_json::to_string(&params).unwrap_or_default();

        RequestFingerprint(format!(
            "{}-{}-{}-{}",
            self.method,
            self.path,
            params,
            self.body.canonical()
        ))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Normalized request identity used as the response-cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Key text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fingerprint_ignores_cache_bust_param() {
        let plain = RequestDescriptor::get("/profile").with_query("page", 1);
        let busted = plain.clone().with_query("_t", 1_700_000_000_000_u64);

        assert_eq!(plain.fingerprint("_t"), busted.fingerprint("_t"));
    }

    #[test]
    fn fingerprint_is_independent_of_param_insertion_order() {
        let a = RequestDescriptor::get("/list").with_query("b", 2).with_query("a", "x");
        let b = RequestDescriptor::get("/list").with_params(json!({"a": "x", "b": 2}));

        assert_eq!(a.fingerprint("_t"), b.fingerprint("_t"));
    }

    #[test]
    fn fingerprint_distinguishes_method_path_params_and_body() {
        let base = RequestDescriptor::get("/items").with_query("page", 1);

        assert_ne!(base.fingerprint("_t"), base.clone().with_query("page", 2).fingerprint("_t"));
        assert_ne!(base.fingerprint("_t"), RequestDescriptor::get("/other").fingerprint("_t"));
        assert_ne!(
            RequestDescriptor::post("/items", json!({"id": 1})).fingerprint("_t"),
            RequestDescriptor::post("/items", json!({"id": 2})).fingerprint("_t")
        );
        assert_ne!(
            RequestDescriptor::get("/items").fingerprint("_t"),
            RequestDescriptor::delete("/items").fingerprint("_t")
        );
    }

    #[test]
    fn fingerprint_format_is_readable() {
        let descriptor = RequestDescriptor::get("/profile").with_query("id", 7);
        assert_eq!(descriptor.fingerprint("_t").as_str(), r#"GET-/profile-{"id":7}-null"#);
    }

    #[test]
    fn derive_retry_spends_budget_and_doubles_delay() {
        let descriptor = RequestDescriptor::get("/x")
            .with_options(RequestOptions::default().retries(3, Duration::from_millis(100)));

        let first = descriptor.derive_retry();
        let second = first.derive_retry();

        assert_eq!(first.options.retry_budget, 2);
        assert_eq!(first.options.retry_delay, Some(Duration::from_millis(200)));
        assert_eq!(second.options.retry_budget, 1);
        assert_eq!(second.options.retry_delay, Some(Duration::from_millis(400)));
        assert_eq!(descriptor.options.retry_budget, 3);
    }

    #[test]
    fn query_pairs_flatten_values() {
        let descriptor = RequestDescriptor::get("/search").with_params(json!({
            "q": "rust",
            "page": 2,
            "tags": ["a", "b"],
            "missing": null,
        }));

        assert_eq!(
            descriptor.query_pairs(),
            vec![
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "rust".to_string()),
                ("tags".to_string(), "a".to_string()),
                ("tags".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn structured_bodies_are_detected() {
        assert!(RequestBody::Json(json!([1, 2])).is_structured());
        assert!(RequestBody::Json(json!({"a": 1})).is_structured());
        assert!(!RequestBody::Json(json!("text")).is_structured());
        assert!(!RequestBody::Form(vec![]).is_structured());
    }

    #[test]
    fn only_get_is_cacheable() {
        let get = RequestDescriptor::get("/a").with_options(RequestOptions::default().cached());
        let post = RequestDescriptor::post("/a", json!({}))
            .with_options(RequestOptions::default().cached());

        assert!(get.is_cacheable());
        assert!(!post.is_cacheable());
        assert!(!RequestDescriptor::get("/a").is_cacheable());
    }
}
