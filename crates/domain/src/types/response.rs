//! Backend envelope and the normalized result handed to callers

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DECODE_ERROR_CODE;

/// Business status reported by the backend, authoritative over HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    /// `datum` holds the payload
    Success,
    /// `message` explains the failure
    Error,
    /// Request was aborted server-side
    Canceled,
}

/// `{ status, message, datum }` as sent by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Business outcome
    pub status: EnvelopeStatus,
    /// Human-readable message; may be empty on success
    #[serde(default)]
    pub message: String,
    /// Payload
    #[serde(default)]
    pub datum: Value,
}

impl Envelope {
    /// Successful envelope carrying `datum`
    pub fn success(datum: Value) -> Self {
        Self { status: EnvelopeStatus::Success, message: String::new(), datum }
    }

    /// Error envelope with no payload
    pub fn error(message: impl Into<String>) -> Self {
        Self { status: EnvelopeStatus::Error, message: message.into(), datum: Value::Null }
    }

    /// Whether `status` is `success`
    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    /// Parse a response body, `None` when it isn't an envelope.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// The only shape a request outcome takes once it leaves the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ApiResult<T = Value> {
    /// Payload of a successful request
    Success {
        /// Decoded `datum`
        data: T,
    },
    /// Failed request.
    ///
    /// `code` is the HTTP status for business and auth errors, `-1` for
    /// network failures and `-2` for undecodable bodies.
    Error {
        /// Error code
        code: i32,
        /// Message shown to the user
        message: String,
        /// Error details from the response body, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    /// Request was aborted before completing
    Canceled,
}

impl<T> ApiResult<T> {
    /// Success result
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Error result without details
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self::Error { code, message: message.into(), data: None }
    }

    /// Error result carrying details from the response body
    pub fn error_with_data(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Error { code, message: message.into(), data }
    }

    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the request failed
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Whether the request was aborted
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Error code, if this is an error
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Error message, if this is an error
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Borrowed payload, if this is a success
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            _ => None,
        }
    }

    /// Owned payload, if this is a success
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data } => Some(data),
            _ => None,
        }
    }

    /// Transform the success payload, keeping errors as they are
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            Self::Success { data } => ApiResult::Success { data: f(data) },
            Self::Error { code, message, data } => ApiResult::Error { code, message, data },
            Self::Canceled => ApiResult::Canceled,
        }
    }
}

impl ApiResult<Value> {
    /// Deserialize a success payload into `U`.
    ///
    /// A payload that doesn't fit `U` becomes an error result with
    /// [`DECODE_ERROR_CODE`], keeping the raw value as `data`.
    pub fn decode<U: DeserializeOwned>(self) -> ApiResult<U> {
        match self {
            Self::Success { data } => match serde_json::from_value::<U>(data.clone()) {
                Ok(decoded) => ApiResult::Success { data: decoded },
                Err(err) => ApiResult::Error {
                    code: DECODE_ERROR_CODE,
                    message: format!("Unexpected response shape: {err}"),
                    data: Some(data),
                },
            },
            Self::Error { code, message, data } => ApiResult::Error { code, message, data },
            Self::Canceled => ApiResult::Canceled,
        }
    }
}
