//! Request lifecycle logging
//!
//! Each request that reaches the network gets an id from a monotonic
//! counter. Start and outcome are emitted as [`RequestEvent`]s to the hooks
//! and mirrored to `tracing`. Payloads are truncated for readability.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use courier_common::resilience::Clock;
use courier_domain::constants::{LOG_TRUNCATE_LIMIT, LOG_TRUNCATE_SUFFIX};
use courier_domain::{ApiResult, HttpMethod, RequestDescriptor};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::hooks::ClientHooks;

/// Lifecycle stage of a logged request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPhase {
    /// Request dispatched
    Start,
    /// Request succeeded
    Success,
    /// Request failed
    Error,
    /// Request was canceled
    Cancel,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Start => "start",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancel => "cancel",
        };
        f.write_str(label)
    }
}

/// One log record handed to [`ClientHooks::on_request_logged`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEvent {
    /// Request id, shared with the loading indicator
    pub id: u64,
    /// Lifecycle stage
    pub phase: RequestPhase,
    /// HTTP method
    pub method: HttpMethod,
    /// Request path as given by the caller
    pub path: String,
    /// Elapsed time; absent on start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Error code; present only on errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Params and body on start, payload or error message afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Handle for a request that has been logged as started
#[derive(Debug)]
pub struct LoggedRequest {
    id: u64,
    method: HttpMethod,
    path: String,
    started: Instant,
}

impl LoggedRequest {
    /// Id assigned at start
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Emits request lifecycle events to hooks and `tracing`
pub struct RequestLogger {
    next_id: AtomicU64,
    hooks: Arc<dyn ClientHooks>,
    clock: Arc<dyn Clock>,
}

impl RequestLogger {
    /// Logger numbering requests from 1
    pub fn new(hooks: Arc<dyn ClientHooks>, clock: Arc<dyn Clock>) -> Self {
        Self { next_id: AtomicU64::new(1), hooks, clock }
    }

    /// Record a dispatched request
    pub fn start(&self, descriptor: &RequestDescriptor) -> LoggedRequest {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = LoggedRequest {
            id,
            method: descriptor.method,
            path: descriptor.path.clone(),
            started: self.clock.now(),
        };

        let params = serde_json::to_string(&descriptor.query).unwrap_or_default();
        let detail = truncate(&format!("params={params} body={}", descriptor.body.canonical()));
        debug!(id, method = %request.method, path = %request.path, %detail, "request started");

        self.emit(&request, RequestPhase::Start, None, Some(detail));
        request
    }

    /// Record the final outcome of `request`
    pub fn finish<T: Serialize>(&self, request: &LoggedRequest, result: &ApiResult<T>) {
        let duration_ms = self.elapsed_ms(request);
        let (id, method, path) = (request.id, request.method, request.path.as_str());

        match result {
            ApiResult::Success { data } => {
                let payload = serde_json::to_value(data).unwrap_or(Value::Null);
                let detail = truncate(&payload.to_string());
                info!(id, %method, path, duration_ms, "request succeeded");
                self.emit(request, RequestPhase::Success, None, Some(detail));
            }
            ApiResult::Error { code, message, .. } => {
                warn!(id, %method, path, duration_ms, code, %message, "request failed");
                self.emit(request, RequestPhase::Error, Some(*code), Some(truncate(message)));
            }
            ApiResult::Canceled => {
                info!(id, %method, path, duration_ms, "request canceled");
                self.emit(request, RequestPhase::Cancel, None, None);
            }
        }
    }

    fn elapsed_ms(&self, request: &LoggedRequest) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(request.started);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn emit(&self, request: &LoggedRequest, phase: RequestPhase, code: Option<i32>, detail: Option<String>) {
        let duration_ms = (phase != RequestPhase::Start).then(|| self.elapsed_ms(request));
        self.hooks.on_request_logged(&RequestEvent {
            id: request.id,
            phase,
            method: request.method,
            path: request.path.clone(),
            duration_ms,
            code,
            detail,
        });
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(LOG_TRUNCATE_LIMIT) {
        Some((cut, _)) => format!("{}{LOG_TRUNCATE_SUFFIX}", &text[..cut]),
        None => text.to_string(),
    }
}
