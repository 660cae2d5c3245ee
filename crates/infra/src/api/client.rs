//! Request pipeline
//!
//! [`ApiClient::execute`] turns a [`RequestDescriptor`] into an
//! [`ApiResult`]:
//!
//! 1. read-only requests flagged for caching are answered from the
//!    [`ResponseCache`] when a live entry exists
//! 2. the wire request gets the bearer token, a trace id and, for GET, a
//!    cache-busting timestamp
//! 3. a loading indicator is held for the whole call
//! 4. auth failures go to the [`AuthRefreshCoordinator`] once, then the
//!    request is replayed; transport and 5xx failures go to the
//!    [`RetryScheduler`]; everything else is final
//!
//! Raw transport errors never leave this module.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use courier_common::cache::CacheStats;
use courier_common::error::ErrorClassification;
use courier_common::resilience::{Clock, LimitMetrics, Permit, SystemClock};
use courier_domain::constants::{
    AUTHORIZATION_HEADER, BYPASS_AUTH_HEADER, CONTENT_TYPE_JSON, REQUEST_ID_HEADER,
};
use courier_domain::{
    ApiResult, ClientConfig, Envelope, EnvelopeStatus, HttpMethod, RequestDescriptor,
    RequestOptions, TokenPair, UploadPart,
};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::auth::{AuthRefreshCoordinator, RefreshError};
use super::cache::ResponseCache;
use super::errors::{status_message, ApiError};
use super::hooks::{ClientHooks, LoadingGuard, NoopHooks};
use super::logger::RequestLogger;
use super::retry::RetryScheduler;
use super::session::SessionExpiry;
use super::token_store::TokenStore;
use crate::http::{HttpTransport, Transport, TransportError, WireRequest, WireResponse};
use crate::storage::{FileStore, MemoryStore, PersistentStore};

const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseMode {
    /// `{status, message, datum}` body; `datum` is the payload
    Envelope,
    /// Body bytes are the payload
    Raw,
}

/// Successful attempt's payload
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Datum(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    fn into_datum(self) -> Value {
        match self {
            Self::Datum(value) => value,
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Datum(value) => value.to_string().into_bytes(),
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Datum(value) => value.serialize(serializer),
            Self::Bytes(bytes) => serializer.serialize_str(&format!("<{} bytes>", bytes.len())),
        }
    }
}

/// Resilient client for one backend origin
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    cache: ResponseCache,
    retry: RetryScheduler,
    auth: AuthRefreshCoordinator,
    session: SessionExpiry,
    hooks: Arc<dyn ClientHooks>,
    logger: RequestLogger,
    clock: Arc<dyn Clock>,
    bypass_auth: AtomicBool,
    trace_ids: AtomicU64,
}

impl ApiClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Run one request through the pipeline.
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, path = %descriptor.path))]
    pub async fn execute(&self, descriptor: RequestDescriptor) -> ApiResult {
        self.execute_with(descriptor, ResponseMode::Envelope, None).await.map(Payload::into_datum)
    }

    /// Like [`execute`](Self::execute), resolving to `canceled` once
    /// `cancel` fires (during the transport call or a retry delay).
    #[instrument(skip(self, descriptor, cancel), fields(method = %descriptor.method, path = %descriptor.path))]
    pub async fn execute_cancellable(
        &self,
        descriptor: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> ApiResult {
        self.execute_with(descriptor, ResponseMode::Envelope, Some(cancel))
            .await
            .map(Payload::into_datum)
    }

    /// Execute and deserialize `datum` into `T`.
    ///
    /// A payload of the wrong shape becomes an error with code `-2`.
    pub async fn execute_as<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> ApiResult<T> {
        self.execute(descriptor).await.decode()
    }

    /// Execute a GET request
    ///
    /// # Arguments
    ///
    /// * `path` - API path (e.g., "/profile") or absolute URL
    /// * `params` - Object of query parameters; `Value::Null` for none
    /// * `options` - Caching, retry and loading behaviour
    ///
    /// # Returns
    ///
    /// The normalized result; `datum` on success
    pub async fn get(&self, path: &str, params: Value, options: RequestOptions) -> ApiResult {
        self.execute(RequestDescriptor::get(path).with_params(params).with_options(options)).await
    }

    /// Execute a POST request
    ///
    /// # Arguments
    ///
    /// * `path` - API path
    /// * `body` - JSON body, sent with `Content-Type: application/json`
    /// * `options` - Retry and loading behaviour
    pub async fn post(&self, path: &str, body: Value, options: RequestOptions) -> ApiResult {
        self.execute(RequestDescriptor::post(path, body).with_options(options)).await
    }

    /// Execute a PUT request with a JSON body
    pub async fn put(&self, path: &str, body: Value, options: RequestOptions) -> ApiResult {
        self.execute(RequestDescriptor::put(path, body).with_options(options)).await
    }

    /// Execute a PATCH request with a JSON body
    pub async fn patch(&self, path: &str, body: Value, options: RequestOptions) -> ApiResult {
        self.execute(RequestDescriptor::patch(path, body).with_options(options)).await
    }

    /// Execute a DELETE request, `params` going into the query string
    pub async fn delete(&self, path: &str, params: Value, options: RequestOptions) -> ApiResult {
        self.execute(RequestDescriptor::delete(path).with_params(params).with_options(options)).await
    }

    /// Multipart upload; uses the upload timeout unless `options` overrides it
    pub async fn upload(&self, path: &str, parts: Vec<UploadPart>, options: RequestOptions) -> ApiResult {
        self.execute(RequestDescriptor::upload(path, parts).with_options(options)).await
    }

    /// Fetch raw bytes. The body is not treated as an envelope unless it is
    /// a JSON error envelope. Never cached.
    #[instrument(skip(self, params, options))]
    pub async fn download(&self, path: &str, params: Value, options: RequestOptions) -> ApiResult<Vec<u8>> {
        let options = RequestOptions { use_cache: false, ..options };
        let descriptor = RequestDescriptor::get(path).with_params(params).with_options(options);
        self.execute_with(descriptor, ResponseMode::Raw, None).await.map(Payload::into_bytes)
    }

    /// Install credentials obtained from a login flow
    pub fn login(&self, tokens: TokenPair) {
        info!("session established");
        self.tokens.set(tokens);
        self.session.reset();
    }

    /// Forget credentials and any user-specific cached responses
    pub fn logout(&self) {
        info!("logging out");
        self.tokens.clear();
        self.cache.clear();
    }

    /// Drop every cached response; returns how many were stored
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    /// Release client-held state at shutdown
    pub fn teardown(&self) {
        let removed = self.cache.clear();
        info!(removed, "client torn down");
    }

    /// The page went to the background; the next session-expired
    /// notification may fire again.
    pub fn handle_visibility_hidden(&self) {
        self.session.reset();
    }

    /// Whether the backend has switched auth failures to non-fatal
    pub fn is_bypass_auth(&self) -> bool {
        self.bypass_auth.load(Ordering::Acquire)
    }

    /// Whether an access token is held
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    /// Current token pair
    pub fn tokens(&self) -> Option<TokenPair> {
        self.tokens.tokens()
    }

    /// Settings this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Response cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Retry slot counters: admitted, rejected and peak in flight
    pub fn retry_metrics(&self) -> LimitMetrics {
        self.retry.metrics()
    }

    /// Retries currently holding a slot
    pub fn retries_in_flight(&self) -> usize {
        self.retry.in_flight()
    }

    /// Refresh calls issued so far
    pub fn refresh_cycles(&self) -> u64 {
        self.auth.cycles()
    }

    /// Session-expired notifications fired so far
    pub fn session_expired_count(&self) -> u64 {
        self.session.notified()
    }

    async fn execute_with(
        &self,
        descriptor: RequestDescriptor,
        mode: ResponseMode,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Payload> {
        let fingerprint = (mode == ResponseMode::Envelope && descriptor.is_cacheable())
            .then(|| descriptor.fingerprint(&self.config.cache_bust_param));

        if let Some(fingerprint) = &fingerprint {
            if let Some(hit) = self.cache.get(fingerprint) {
                debug!(%fingerprint, "served from response cache");
                return ApiResult::success(Payload::Datum(hit));
            }
        }

        let logged = self.logger.start(&descriptor);
        let _loading = descriptor
            .options
            .show_loading
            .then(|| LoadingGuard::start(Arc::clone(&self.hooks), logged.id()));
        let cache_ttl = descriptor.options.cache_ttl;
        let invalidate_cache = descriptor.options.invalidate_cache;

        let result = match self.run(descriptor, mode, cancel).await {
            Ok(payload) => {
                if let (Some(fingerprint), Payload::Datum(datum)) = (fingerprint, &payload) {
                    self.cache.set(fingerprint, datum.clone(), cache_ttl);
                }
                if invalidate_cache {
                    self.cache.clear();
                }
                ApiResult::success(payload)
            }
            Err(err) => err.into_result(),
        };

        self.logger.finish(&logged, &result);
        result
    }

    /// Attempt loop: at most one auth replay, retries while admitted.
    async fn run(
        &self,
        descriptor: RequestDescriptor,
        mode: ResponseMode,
        cancel: Option<&CancellationToken>,
    ) -> Result<Payload, ApiError> {
        let mut current = descriptor;
        // held until the request finishes, released on every exit path
        let mut retry_permits: Vec<Permit> = Vec::new();
        let mut refreshed = false;

        loop {
            let error = match self.attempt(&current, mode, cancel).await {
                Ok(payload) => return Ok(payload),
                Err(err) => err,
            };

            if error.is_canceled() {
                return Err(error);
            }

            if error.is_auth_failure() {
                self.recover_auth(error, &mut refreshed).await?;
                continue;
            }

            let Some(retry) = self.retry.admit(&current, &error) else {
                return Err(error);
            };
            warn!(
                path = %current.path,
                delay_ms = u64::try_from(retry.delay().as_millis()).unwrap_or(u64::MAX),
                remaining = retry.descriptor().options.retry_budget,
                in_flight = self.retry.in_flight(),
                severity = error.severity().as_str(),
                error = %error,
                "retrying request"
            );

            match cancel {
                Some(cancel) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ApiError::Canceled),
                        _ = retry.wait() => {}
                    }
                }
                None => retry.wait().await,
            }

            let (next, permit) = retry.into_parts();
            retry_permits.push(permit);
            current = next;
        }
    }

    /// `Ok` means the request should be replayed with the renewed token.
    async fn recover_auth(&self, error: ApiError, refreshed: &mut bool) -> Result<(), ApiError> {
        if self.is_bypass_auth() {
            debug!(error = %error, "auth failure in bypass mode");
            return Err(error);
        }

        if *refreshed {
            warn!("still unauthorized after token refresh");
            self.tokens.clear();
            self.session.signal();
            return Err(ApiError::Auth { message: SESSION_EXPIRED_MESSAGE.to_string() });
        }

        match self.auth.refresh().await {
            Ok(_) => {
                *refreshed = true;
                debug!("replaying request with renewed token");
                Ok(())
            }
            Err(RefreshError::Abandoned) => {
                Err(ApiError::Auth { message: RefreshError::Abandoned.to_string() })
            }
            Err(err) => {
                debug!(error = %err, "token refresh failed");
                self.session.signal();
                Err(ApiError::Auth { message: SESSION_EXPIRED_MESSAGE.to_string() })
            }
        }
    }

    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        mode: ResponseMode,
        cancel: Option<&CancellationToken>,
    ) -> Result<Payload, ApiError> {
        let request = self.wire_request(descriptor);
        debug!(
            method = %request.method,
            path = %descriptor.path,
            request_id = request.header(REQUEST_ID_HEADER).unwrap_or_default(),
            "dispatching"
        );

        let sent = self.transport.send(request);
        let response = match cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(TransportError::Aborted),
                    response = sent => response,
                }
            }
            None => sent.await,
        }?;

        self.observe_bypass(&response);

        match mode {
            ResponseMode::Envelope => self.interpret(response).map(Payload::Datum),
            ResponseMode::Raw => self.interpret_raw(response).map(Payload::Bytes),
        }
    }

    fn wire_request(&self, descriptor: &RequestDescriptor) -> WireRequest {
        let timeout = descriptor.options.timeout.unwrap_or(if descriptor.body.is_multipart() {
            self.config.upload_timeout
        } else {
            self.config.timeout
        });

        let mut request =
            WireRequest::new(descriptor.method, join_url(&self.config.base_url, &descriptor.path), timeout)
                .with_body(descriptor.body.clone());

        request.query = descriptor.query_pairs();
        if descriptor.method == HttpMethod::Get && self.config.cache_bust_enabled {
            let param = &self.config.cache_bust_param;
            request.query.retain(|(key, _)| key != param);
            request.query.push((param.clone(), self.clock.millis_since_epoch().to_string()));
        }

        for (name, value) in &descriptor.headers {
            request.set_header(name.as_str(), value.as_str());
        }
        if let Some(token) = self.tokens.access_token() {
            request.set_header(AUTHORIZATION_HEADER, format!("Bearer {token}"));
        }
        let trace_id = self.trace_ids.fetch_add(1, Ordering::Relaxed) + 1;
        request.set_header(REQUEST_ID_HEADER, trace_id.to_string());
        if descriptor.method.mutates_state() && descriptor.body.is_structured() {
            request.set_header("Content-Type", CONTENT_TYPE_JSON);
        }
        request
    }

    fn observe_bypass(&self, response: &WireResponse) {
        let flagged = response
            .header(BYPASS_AUTH_HEADER)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
        if flagged && !self.bypass_auth.swap(true, Ordering::AcqRel) {
            info!("backend enabled bypass-auth mode");
            self.hooks.on_bypass_auth_enabled();
        }
    }

    /// Classify an envelope response; `Ok` carries `datum`.
    fn interpret(&self, response: WireResponse) -> Result<Value, ApiError> {
        if !response.is_success() {
            return Err(self.status_error(&response));
        }

        let Some(envelope) = Envelope::parse(&response.body) else {
            return Err(ApiError::Decode("response body is not an envelope".into()));
        };

        match envelope.status {
            EnvelopeStatus::Success => Ok(envelope.datum),
            EnvelopeStatus::Canceled => Err(ApiError::Canceled),
            EnvelopeStatus::Error if envelope.message.contains(&self.config.invalid_token_marker) => {
                Err(ApiError::Auth { message: envelope.message })
            }
            EnvelopeStatus::Error => {
                let message = if envelope.message.is_empty() {
                    status_message(response.status)
                } else {
                    envelope.message
                };
                Err(ApiError::Business {
                    code: i32::from(response.status),
                    message,
                    data: Some(envelope.datum).filter(|d| !d.is_null()),
                })
            }
        }
    }

    fn interpret_raw(&self, response: WireResponse) -> Result<Vec<u8>, ApiError> {
        if !response.is_success() {
            return Err(self.status_error(&response));
        }
        let is_json = response.header("content-type").is_some_and(|ct| ct.contains("json"));
        let error_envelope = is_json
            && Envelope::parse(&response.body).is_some_and(|e| e.status != EnvelopeStatus::Success);
        if !error_envelope {
            return Ok(response.body);
        }
        self.interpret(response).map(|datum| datum.to_string().into_bytes())
    }

    /// Error for a non-2xx response
    fn status_error(&self, response: &WireResponse) -> ApiError {
        let body: Option<Value> = serde_json::from_slice(&response.body).ok();
        let field = |name: &str| {
            body.as_ref()
                .and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let message = field("message").or_else(|| field("error")).unwrap_or_else(|| status_message(response.status));
        let data = body
            .as_ref()
            .and_then(|b| b.get("data").or_else(|| b.get("datum")))
            .filter(|d| !d.is_null())
            .cloned();

        if response.status == 401 || message.contains(&self.config.invalid_token_marker) {
            return ApiError::Auth { message };
        }
        if response.is_server_error() {
            return ApiError::Server { status: response.status, message, data };
        }
        ApiError::Business { code: i32::from(response.status), message, data }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("tokens", &self.tokens)
            .field("bypass_auth", &self.is_bypass_auth())
            .finish_non_exhaustive()
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn PersistentStore>>,
    hooks: Option<Arc<dyn ClientHooks>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ApiClientBuilder {
    /// Client settings; defaults when never called
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override only the backend origin of the current settings
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let config = self.config.take().unwrap_or_default();
        self.config = Some(config.with_base_url(base_url));
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Token mirror; defaults to a file store when `storage_dir` is set,
    /// memory otherwise
    pub fn store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// UI callbacks; no-ops by default
    pub fn hooks(mut self, hooks: Arc<dyn ClientHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Time source for cache TTLs, debounce and the cache buster
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the config, hydrate persisted tokens and assemble the client.
    pub fn build(self) -> courier_domain::Result<ApiClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let hooks: Arc<dyn ClientHooks> = match self.hooks {
            Some(hooks) => hooks,
            None => Arc::new(NoopHooks),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let mut http = HttpTransport::builder().timeout(config.timeout);
                if let Some(agent) = &config.user_agent {
                    http = http.user_agent(agent.clone());
                }
                Arc::new(http.build()?)
            }
        };
        let store: Arc<dyn PersistentStore> = match (self.store, &config.storage_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileStore::for_origin(dir, &config.base_url)),
            (None, None) => Arc::new(MemoryStore::new()),
        };

        let tokens = Arc::new(TokenStore::new(store, config.storage_key.clone()));
        if let Err(err) = tokens.hydrate() {
            warn!(error = %err, "ignoring unreadable persisted session");
        }

        let auth = AuthRefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&tokens),
            join_url(&config.base_url, &config.refresh_path),
            config.timeout,
        );

        debug!(base_url = %config.base_url, "api client built");

        Ok(ApiClient {
            cache: ResponseCache::with_clock(
                config.default_cache_ttl,
                config.cache_max_entries,
                Arc::clone(&clock),
            ),
            retry: RetryScheduler::new(config.max_concurrent_retries, config.default_retry_delay),
            session: SessionExpiry::new(config.login_alert_reset, Arc::clone(&clock), Arc::clone(&hooks)),
            logger: RequestLogger::new(Arc::clone(&hooks), Arc::clone(&clock)),
            auth,
            tokens,
            transport,
            hooks,
            clock,
            config,
            bypass_auth: AtomicBool::new(false),
            trace_ids: AtomicU64::new(0),
        })
    }
}
