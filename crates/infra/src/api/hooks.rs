//! Notification hooks for UI-side collaborators
//!
//! The client never renders anything itself. Loading indicators, the
//! "session expired" prompt and request logs are forwarded to a
//! [`ClientHooks`] implementation supplied at build time.

use std::sync::Arc;

use super::logger::RequestEvent;

/// Callbacks fired by the client; every method defaults to a no-op
pub trait ClientHooks: Send + Sync {
    /// A request that wants a loading indicator started
    fn on_loading_start(&self, _id: u64) {}

    /// The request with this id finished, on any path
    fn on_loading_end(&self, _id: u64) {}

    /// Authentication could not be recovered; fired at most once per
    /// debounce window
    fn on_session_expired(&self) {}

    /// A request log event, see [`RequestEvent`]
    fn on_request_logged(&self, _event: &RequestEvent) {}

    /// The backend switched the client into bypass-auth mode
    fn on_bypass_auth_enabled(&self) {}
}

/// Hooks that ignore every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ClientHooks for NoopHooks {}

/// Holds a loading indicator open; ends it when dropped.
#[must_use = "the loading indicator ends as soon as the guard is dropped"]
pub struct LoadingGuard {
    hooks: Arc<dyn ClientHooks>,
    id: u64,
}

impl LoadingGuard {
    /// Start the indicator for request `id`
    pub fn start(hooks: Arc<dyn ClientHooks>, id: u64) -> Self {
        hooks.on_loading_start(id);
        Self { hooks, id }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.hooks.on_loading_end(self.id);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl ClientHooks for Calls {
        fn on_loading_start(&self, id: u64) {
            self.0.lock().push(format!("start:{id}"));
        }

        fn on_loading_end(&self, id: u64) {
            self.0.lock().push(format!("end:{id}"));
        }
    }

    #[test]
    fn guard_ends_loading_once_on_drop() {
        let calls = Arc::new(Calls::default());
        {
            let _guard = LoadingGuard::start(calls.clone(), 7);
            assert_eq!(*calls.0.lock(), vec!["start:7"]);
        }
        assert_eq!(*calls.0.lock(), vec!["start:7", "end:7"]);
    }

    #[test]
    fn guard_ends_loading_on_unwind() {
        let calls = Arc::new(Calls::default());
        let hooks = calls.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = LoadingGuard::start(hooks, 1);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(*calls.0.lock(), vec!["start:1", "end:1"]);
    }
}
