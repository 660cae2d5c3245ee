//! Observability
//!
//! Process-wide tracing setup. Request-level events are emitted by
//! [`crate::api::RequestLogger`].

pub mod logging;

pub use logging::init_tracing;
