//! Error types used throughout the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Setup and plumbing errors.
///
/// Request outcomes never use this type; they are normalized into
/// [`crate::ApiResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CourierError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent store read or write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON or TOML (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal state
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for client setup operations
pub type Result<T> = std::result::Result<T, CourierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let err = CourierError::Storage("disk full".into());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "Storage");
        assert_eq!(json["message"], "disk full");
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn json_errors_convert() {
        let err: CourierError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CourierError::Serialization(_)));
    }
}
