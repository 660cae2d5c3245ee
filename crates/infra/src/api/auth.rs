//! Single-flight access-token renewal
//!
//! State machine `Idle -> Refreshing -> Idle`. The first caller to need a
//! new token becomes the leader and calls the refresh endpoint; everyone
//! arriving while that call is outstanding parks a oneshot waiter and gets
//! the leader's outcome. Settling a cycle drains the waiter list and
//! returns to `Idle` under one lock, so a new cycle never starts while
//! waiters from the previous one are still queued.
//!
//! If the leader's future is dropped mid-call, the cycle settles as
//! [`RefreshError::Abandoned`] and every waiter is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_domain::constants::CONTENT_TYPE_JSON;
use courier_domain::{Envelope, HttpMethod, RefreshedTokens, RequestBody};
use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::errors::status_message;
use super::token_store::TokenStore;
use crate::http::{Transport, TransportError, WireRequest};

/// Why a refresh cycle failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token is held
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// Refresh endpoint answered with an error
    #[error("Refresh rejected: {0}")]
    Rejected(String),

    /// Refresh request got no response
    #[error("Refresh request failed: {0}")]
    Transport(TransportError),

    /// Refresh response lacked a usable access token
    #[error("Malformed refresh response: {0}")]
    Malformed(String),

    /// Leading caller was dropped before the cycle finished
    #[error("Refresh interrupted before completion")]
    Abandoned,
}

impl RefreshError {
    /// Whether the session is unrecoverable (tokens cleared, user must log in)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Abandoned)
    }
}

type RefreshOutcome = Result<String, RefreshError>;

enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Serializes token renewal across all concurrent callers
pub struct AuthRefreshCoordinator {
    state: Mutex<RefreshState>,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    refresh_url: String,
    timeout: Duration,
    cycles: AtomicU64,
}

impl AuthRefreshCoordinator {
    /// Coordinator renewing through `refresh_url` with its own timeout.
    ///
    /// The refresh call goes straight to `transport`, bypassing the
    /// pipeline's auth handling.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        refresh_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            transport,
            tokens,
            refresh_url: refresh_url.into(),
            timeout,
            cycles: AtomicU64::new(0),
        }
    }

    /// Obtain a fresh access token, joining an in-flight refresh if any.
    pub async fn refresh(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.state.lock();
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            debug!("token refresh in progress, waiting for its outcome");
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        info!(cycle, "refreshing access token");

        let guard = CycleGuard { coordinator: self, settled: false };
        let outcome = self.request_new_token().await;
        guard.settle(outcome)
    }

    /// Resolve every waiter of the current cycle with `token`
    fn on_refreshed(&self, token: &str) {
        let waiters = self.drain();
        info!(waiters = waiters.len(), "access token refreshed");
        for waiter in waiters {
            let _ = waiter.send(Ok(token.to_string()));
        }
    }

    /// Reject every waiter of the current cycle with `error`
    fn on_refresh_failed(&self, error: &RefreshError) {
        if error.is_terminal() {
            self.tokens.clear();
        }
        let waiters = self.drain();
        warn!(waiters = waiters.len(), error = %error, "access token refresh failed");
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn drain(&self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        match std::mem::replace(&mut *self.state.lock(), RefreshState::Idle) {
            RefreshState::Refreshing(waiters) => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }

    async fn request_new_token(&self) -> RefreshOutcome {
        let refresh_token = self.tokens.refresh_token().ok_or(RefreshError::MissingRefreshToken)?;

        let request = WireRequest::new(HttpMethod::Post, self.refresh_url.as_str(), self.timeout)
            .with_header("Content-Type", CONTENT_TYPE_JSON)
            .with_body(RequestBody::Json(json!({ "refreshToken": refresh_token })));

        let response = self.transport.send(request).await.map_err(RefreshError::Transport)?;
        let envelope = Envelope::parse(&response.body);

        if !response.is_success() {
            let message = envelope
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status_message(response.status));
            return Err(RefreshError::Rejected(message));
        }

        let envelope = envelope
            .ok_or_else(|| RefreshError::Malformed("response body is not an envelope".into()))?;
        if !envelope.is_success() {
            return Err(RefreshError::Rejected(envelope.message));
        }

        let renewed: RefreshedTokens = serde_json::from_value(envelope.datum)
            .map_err(|err| RefreshError::Malformed(err.to_string()))?;
        if renewed.access_token.is_empty() {
            return Err(RefreshError::Malformed("empty access token".into()));
        }

        let rotated = renewed.refresh_token.filter(|token| !token.is_empty());
        if rotated.is_some() {
            debug!("refresh token rotated");
        }
        self.tokens.apply_refresh(&renewed.access_token, rotated);
        Ok(renewed.access_token)
    }

    #[cfg(test)]
    fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing(_))
    }

    #[cfg(test)]
    fn waiting(&self) -> usize {
        match &*self.state.lock() {
            RefreshState::Refreshing(waiters) => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Refresh calls issued so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}

/// Settles the leader's cycle exactly once, even if the leader is dropped.
struct CycleGuard<'a> {
    coordinator: &'a AuthRefreshCoordinator,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, outcome: RefreshOutcome) -> RefreshOutcome {
        self.settled = true;
        match &outcome {
            Ok(token) => self.coordinator.on_refreshed(token),
            Err(err) => self.coordinator.on_refresh_failed(err),
        }
        outcome
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.on_refresh_failed(&RefreshError::Abandoned);
        }
    }
}
