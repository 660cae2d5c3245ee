//! Conversions from third-party errors into courier error types

pub mod conversions;

pub use conversions::InfraError;
