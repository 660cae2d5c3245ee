//! Configuration loading
//!
//! Builds a validated [`courier_domain::ClientConfig`] from environment
//! variables or a config file.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
