//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_common::resilience::{Clock, MockClock};
use courier_domain::{ClientConfig, TokenPair};
use courier_infra::api::{ApiClient, ClientHooks, RequestEvent};
use courier_infra::http::{Transport, TransportError, WireRequest, WireResponse};
use courier_infra::storage::MemoryStore;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;

pub const BASE_URL: &str = "http://api.test";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const INVALID_TOKEN: &str = "无效的访问令牌";

/// What the scripted backend does with one request
pub struct Reply {
    pub delay: Duration,
    pub outcome: Result<WireResponse, TransportError>,
}

impl Reply {
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub fn respond(response: WireResponse) -> Reply {
    Reply { delay: Duration::ZERO, outcome: Ok(response) }
}

pub fn fail(error: TransportError) -> Reply {
    Reply { delay: Duration::ZERO, outcome: Err(error) }
}

/// `200` success envelope around `datum`
pub fn success(datum: Value) -> Reply {
    respond(WireResponse::json(200, &json!({"status": "success", "message": "", "datum": datum})))
}

/// `200` error envelope
pub fn business_error(message: &str) -> Reply {
    respond(WireResponse::json(200, &json!({"status": "error", "message": message, "datum": null})))
}

pub fn status(code: u16) -> Reply {
    respond(WireResponse::new(code, Vec::new()))
}

/// A request as the backend saw it
#[derive(Debug, Clone)]
pub struct Seen {
    pub request: WireRequest,
    pub at: Instant,
}

impl Seen {
    pub fn bearer(&self) -> Option<&str> {
        self.request.header("Authorization").and_then(|v| v.strip_prefix("Bearer "))
    }
}

type Handler = dyn Fn(&WireRequest) -> Reply + Send + Sync;

/// In-process backend driven by a closure; records every request
pub struct ScriptedTransport {
    handler: Box<Handler>,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&WireRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { handler: Box::new(handler), seen: Mutex::new(Vec::new()) })
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.seen.lock().iter().filter(|s| s.request.path() == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let reply = (self.handler)(&request);
        self.seen.lock().push(Seen { request, at: Instant::now() });
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.outcome
    }
}

/// Refresh endpoint that issues `access` (and optionally rotates the refresh token)
pub fn refresh_ok(access: &str) -> Reply {
    success(json!({"accessToken": access}))
}

/// Hooks that count every notification
#[derive(Default)]
pub struct RecordingHooks {
    pub loading_started: AtomicUsize,
    pub loading_ended: AtomicUsize,
    pub session_expired: AtomicUsize,
    pub bypass_enabled: AtomicUsize,
    pub events: Mutex<Vec<RequestEvent>>,
}

impl RecordingHooks {
    pub fn started(&self) -> usize {
        self.loading_started.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.loading_ended.load(Ordering::SeqCst)
    }

    pub fn expired(&self) -> usize {
        self.session_expired.load(Ordering::SeqCst)
    }

    pub fn bypassed(&self) -> usize {
        self.bypass_enabled.load(Ordering::SeqCst)
    }
}

impl ClientHooks for RecordingHooks {
    fn on_loading_start(&self, _id: u64) {
        self.loading_started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_loading_end(&self, _id: u64) {
        self.loading_ended.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_expired(&self) {
        self.session_expired.fetch_add(1, Ordering::SeqCst);
    }

    fn on_request_logged(&self, event: &RequestEvent) {
        self.events.lock().push(event.clone());
    }

    fn on_bypass_auth_enabled(&self) {
        self.bypass_enabled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a scenario needs to inspect
pub struct Harness {
    pub client: Arc<ApiClient>,
    pub transport: Arc<ScriptedTransport>,
    pub hooks: Arc<RecordingHooks>,
    pub clock: MockClock,
    pub store: MemoryStore,
}

pub fn config() -> ClientConfig {
    ClientConfig::default().with_base_url(BASE_URL)
}

pub fn harness(transport: Arc<ScriptedTransport>) -> Harness {
    harness_with(config(), transport)
}

pub fn harness_with(config: ClientConfig, transport: Arc<ScriptedTransport>) -> Harness {
    let hooks = Arc::new(RecordingHooks::default());
    let clock = MockClock::new();
    let store = MemoryStore::new();
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

    let client = ApiClient::builder()
        .config(config)
        .transport(transport.clone())
        .store(Arc::new(store.clone()))
        .hooks(hooks.clone())
        .clock(shared_clock)
        .build()
        .expect("client should build");

    Harness { client: Arc::new(client), transport, hooks, clock, store }
}

pub fn signed_in(transport: Arc<ScriptedTransport>) -> Harness {
    let harness = harness(transport);
    harness.client.login(TokenPair::new("a1", "r1"));
    harness
}
