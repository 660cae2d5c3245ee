//! Debounced "session expired" notification
//!
//! Many requests can fail authentication at once; the user must be
//! prompted only once. After a notification fires, further signals are
//! swallowed until the page is hidden or the reset window has passed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_common::resilience::Clock;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::hooks::ClientHooks;

/// Fires [`ClientHooks::on_session_expired`] at most once per window
pub struct SessionExpiry {
    raised_at: Mutex<Option<Instant>>,
    reset_after: Duration,
    clock: Arc<dyn Clock>,
    hooks: Arc<dyn ClientHooks>,
    notified: AtomicU64,
}

impl SessionExpiry {
    /// Debouncer re-arming itself `reset_after` after a notification
    pub fn new(reset_after: Duration, clock: Arc<dyn Clock>, hooks: Arc<dyn ClientHooks>) -> Self {
        Self { raised_at: Mutex::new(None), reset_after, clock, hooks, notified: AtomicU64::new(0) }
    }

    /// Report an unrecoverable auth failure.
    ///
    /// Returns `true` if this call fired the notification.
    pub fn signal(&self) -> bool {
        let now = self.clock.now();
        {
            let mut raised_at = self.raised_at.lock();
            if let Some(at) = *raised_at {
                if now.saturating_duration_since(at) < self.reset_after {
                    debug!("session expiry already signalled");
                    return false;
                }
            }
            *raised_at = Some(now);
        }

        self.notified.fetch_add(1, Ordering::Relaxed);
        warn!("session expired, login required");
        self.hooks.on_session_expired();
        true
    }

    /// Re-arm the notification (page became hidden)
    pub fn reset(&self) {
        if self.raised_at.lock().take().is_some() {
            debug!("session expiry debounce reset");
        }
    }

    /// Notifications fired so far
    pub fn notified(&self) -> u64 {
        self.notified.load(Ordering::Relaxed)
    }
}
