//! # Courier Domain
//!
//! Plain data for the courier API client: request descriptors and their
//! cache fingerprints, the backend envelope, the normalized
//! [`ApiResult`], credentials, configuration and setup errors.
//!
//! No I/O lives here and no other courier crate is depended on.

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use types::*;
