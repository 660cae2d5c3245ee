//! # Courier Infrastructure
//!
//! I/O side of the client:
//! - `http`: the [`Transport`] seam and its reqwest implementation
//! - `api`: the [`ApiClient`] pipeline and its collaborators
//! - `storage`: persistent mirrors for the token record
//! - `config`: loading [`courier_domain::ClientConfig`] from env or file
//! - `observability`: tracing subscriber setup

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

pub use api::{ApiClient, ApiClientBuilder, ApiError, ClientHooks, NoopHooks, RequestEvent, RequestPhase};
pub use errors::InfraError;
pub use http::{HttpTransport, Transport, TransportError, WireRequest, WireResponse};
pub use observability::init_tracing;
pub use storage::{FileStore, MemoryStore, PersistentStore};
