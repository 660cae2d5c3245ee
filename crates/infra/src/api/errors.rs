//! API-specific error types
//!
//! Every failed attempt inside the pipeline is classified into an
//! [`ApiError`]. Only the pipeline sees these; callers get the normalized
//! [`ApiResult`].

use courier_common::error::{ErrorClassification, ErrorSeverity};
use courier_domain::constants::{AUTH_ERROR_CODE, DECODE_ERROR_CODE, NETWORK_ERROR_CODE};
use courier_domain::ApiResult;
use serde_json::Value;
use thiserror::Error;

use crate::http::TransportError;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// No response at all - retryable
    Transport,
    /// 5xx responses - retryable
    Server,
    /// Invalid access token - handled by the refresh coordinator
    Authentication,
    /// Error envelopes and other 4xx - final
    Business,
    /// Malformed payloads - final
    Decode,
    /// Aborted requests - final, no side effects
    Canceled,
}

/// Outcome of a failed attempt
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// No response; code `-1`
    #[error(transparent)]
    Transport(TransportError),

    /// HTTP 5xx
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status
        status: u16,
        /// Body message or the status text
        message: String,
        /// `data` or `datum` from the body
        data: Option<Value>,
    },

    /// 401 or invalid-token envelope; code `401`
    #[error("Authentication failed: {message}")]
    Auth {
        /// Shown to the user
        message: String,
    },

    /// Error envelope or non-5xx status; never retried
    #[error("{message}")]
    Business {
        /// HTTP status of the response
        code: i32,
        /// Server message, verbatim
        message: String,
        /// `data` or `datum` from the body
        data: Option<Value>,
    },

    /// Body was not a usable envelope; code `-2`
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Aborted by the caller or the backend
    #[error("Request canceled")]
    Canceled,
}

impl ApiError {
    /// Error category driving retry and refresh decisions
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Transport(TransportError::Aborted) | Self::Canceled => ApiErrorCategory::Canceled,
            Self::Transport(_) => ApiErrorCategory::Transport,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Auth { .. } => ApiErrorCategory::Authentication,
            Self::Business { .. } => ApiErrorCategory::Business,
            Self::Decode(_) => ApiErrorCategory::Decode,
        }
    }

    /// Code reported in the [`ApiResult::Error`] this error becomes
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport(_) | Self::Canceled => NETWORK_ERROR_CODE,
            Self::Server { status, .. } => i32::from(*status),
            Self::Auth { .. } => AUTH_ERROR_CODE,
            Self::Business { code, .. } => *code,
            Self::Decode(_) => DECODE_ERROR_CODE,
        }
    }

    /// Whether the refresh path should handle this error
    pub fn is_auth_failure(&self) -> bool {
        self.category() == ApiErrorCategory::Authentication
    }

    /// Whether the request was aborted
    pub fn is_canceled(&self) -> bool {
        self.category() == ApiErrorCategory::Canceled
    }

    /// Normalize into the caller-facing result.
    ///
    /// Transport failures carry a generic connectivity message; business
    /// errors keep the server's message verbatim.
    pub fn into_result<T>(self) -> ApiResult<T> {
        match self {
            Self::Transport(TransportError::Aborted) | Self::Canceled => ApiResult::Canceled,
            Self::Transport(TransportError::Timeout(after)) => ApiResult::error(
                NETWORK_ERROR_CODE,
                format!("Request timed out after {}, please check your connection", human_duration(after)),
            ),
            Self::Transport(err) => ApiResult::error_with_data(
                NETWORK_ERROR_CODE,
                "Network error, please check your connection",
                Some(Value::String(err.to_string())),
            ),
            Self::Server { status, message, data } => {
                ApiResult::error_with_data(i32::from(status), message, data)
            }
            Self::Auth { message } => ApiResult::error(AUTH_ERROR_CODE, message),
            Self::Business { code, message, data } => ApiResult::error_with_data(code, message, data),
            Self::Decode(message) => ApiResult::error(DECODE_ERROR_CODE, message),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => Self::Canceled,
            other => Self::Transport(other),
        }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Server { .. } => true,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ApiErrorCategory::Canceled => ErrorSeverity::Info,
            ApiErrorCategory::Transport | ApiErrorCategory::Business => ErrorSeverity::Warning,
            ApiErrorCategory::Server | ApiErrorCategory::Authentication => ErrorSeverity::Error,
            ApiErrorCategory::Decode => ErrorSeverity::Error,
        }
    }
}

fn human_duration(duration: std::time::Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Fallback message for an error status whose body carried none
pub fn status_message(status: u16) -> String {
    match status {
        400 => "Bad request parameters".to_string(),
        401 => "Not logged in or session expired".to_string(),
        403 => "Access denied".to_string(),
        404 => "Requested resource not found".to_string(),
        405 => "Method not allowed".to_string(),
        408 => "Request timeout".to_string(),
        429 => "Too many requests, please try again later".to_string(),
        500 => "Internal server error".to_string(),
        502 => "Bad gateway".to_string(),
        503 => "Service unavailable".to_string(),
        504 => "Gateway timeout".to_string(),
        other => format!("Request failed ({other})"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ApiError::Auth { message: "expired".into() }.category(),
            ApiErrorCategory::Authentication
        );
        assert_eq!(ApiError::from(TransportError::Aborted).category(), ApiErrorCategory::Canceled);
        assert_eq!(
            ApiError::Transport(TransportError::Timeout(Duration::from_secs(30))).category(),
            ApiErrorCategory::Transport
        );
    }

    #[test]
    fn only_transport_and_server_errors_retry() {
        assert!(ApiError::Transport(TransportError::Network("reset".into())).is_retryable());
        assert!(ApiError::Server { status: 502, message: "bad".into(), data: None }.is_retryable());

        assert!(!ApiError::Auth { message: "x".into() }.is_retryable());
        assert!(!ApiError::Business { code: 400, message: "x".into(), data: None }.is_retryable());
        assert!(!ApiError::Decode("x".into()).is_retryable());
        assert!(!ApiError::Canceled.is_retryable());
        assert!(!ApiError::Transport(TransportError::InvalidRequest("x".into())).is_retryable());
    }

    #[test]
    fn codes_follow_the_taxonomy() {
        assert_eq!(ApiError::Transport(TransportError::Network("x".into())).code(), -1);
        assert_eq!(ApiError::Server { status: 503, message: "x".into(), data: None }.code(), 503);
        assert_eq!(ApiError::Auth { message: "x".into() }.code(), 401);
        assert_eq!(ApiError::Decode("x".into()).code(), -2);
    }

    #[test]
    fn normalizes_into_results() {
        let result: ApiResult =
            ApiError::Business { code: 409, message: "Name taken".into(), data: None }.into_result();
        assert_eq!(result, ApiResult::error(409, "Name taken"));

        let network: ApiResult = ApiError::Transport(TransportError::Network("reset".into())).into_result();
        assert_eq!(network.code(), Some(-1));

        let timeout: ApiResult =
            ApiError::Transport(TransportError::Timeout(Duration::from_millis(1_500))).into_result();
        assert!(timeout.message().unwrap_or_default().contains("1500ms"));

        let canceled: ApiResult = ApiError::Canceled.into_result();
        assert!(canceled.is_canceled());
    }

    #[test]
    fn status_messages_cover_common_codes() {
        assert_eq!(status_message(404), "Requested resource not found");
        assert_eq!(status_message(503), "Service unavailable");
        assert_eq!(status_message(418), "Request failed (418)");
    }
}
