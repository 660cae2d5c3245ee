//! Conversions from external infrastructure errors into courier errors.

use std::time::Duration;

use courier_domain::CourierError;
use reqwest::Error as HttpError;

use crate::http::TransportError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CourierError);

impl From<InfraError> for CourierError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CourierError> for InfraError {
    fn from(value: CourierError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → CourierError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let message = match value.kind() {
            ErrorKind::PermissionDenied => format!("permission denied: {value}"),
            ErrorKind::NotFound => format!("path not found: {value}"),
            _ => format!("i/o failure: {value}"),
        };
        InfraError(CourierError::Storage(message))
    }
}

/* -------------------------------------------------------------------------- */
/* config parsing → CourierError */
/* -------------------------------------------------------------------------- */

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(CourierError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(CourierError::Serialization(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CourierError / TransportError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(CourierError::Config(format!("invalid HTTP client setup: {value}")));
        }
        InfraError(CourierError::Internal(value.to_string()))
    }
}

/// Classify a failed reqwest call.
///
/// `timeout` is the limit the request was sent with, reported back in
/// [`TransportError::Timeout`].
pub(crate) fn classify_http_error(err: &HttpError, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }

    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        return TransportError::Network(format!("connection failure: {err}"));
    }

    TransportError::Network(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::Client;

    use super::*;

    #[test]
    fn io_permission_error_maps_to_storage() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let mapped: CourierError = InfraError::from(err).into();
        match mapped {
            CourierError::Storage(msg) => assert!(msg.contains("permission denied")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn toml_error_maps_to_config() {
        let err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let mapped: CourierError = InfraError::from(err).into();
        assert!(matches!(mapped, CourierError::Config(msg) if msg.contains("TOML")));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let err = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped = classify_http_error(&err, Duration::from_secs(1));
        assert!(matches!(mapped, TransportError::Network(_)), "got {mapped:?}");
    }
}
