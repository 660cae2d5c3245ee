//! Resilient API client
//!
//! [`ApiClient`] is the single entry point. The pieces it composes:
//!
//! - [`TokenStore`]: access/refresh pair, mirrored to persistent storage
//! - [`AuthRefreshCoordinator`]: single-flight token renewal
//! - [`RetryScheduler`]: exponential backoff under a global ceiling
//! - [`ResponseCache`]: TTL cache keyed by request fingerprint
//! - [`SessionExpiry`]: debounced "please log in again" notification
//! - [`RequestLogger`] and [`ClientHooks`]: lifecycle events for the host UI

pub mod auth;
pub mod cache;
pub mod client;
pub mod errors;
pub mod hooks;
pub mod logger;
pub mod retry;
pub mod session;
pub mod token_store;

pub use auth::{AuthRefreshCoordinator, RefreshError};
pub use cache::ResponseCache;
pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{status_message, ApiError, ApiErrorCategory};
pub use hooks::{ClientHooks, LoadingGuard, NoopHooks};
pub use logger::{LoggedRequest, RequestEvent, RequestLogger, RequestPhase};
pub use retry::{RetryScheduler, ScheduledRetry};
pub use session::SessionExpiry;
pub use token_store::TokenStore;
