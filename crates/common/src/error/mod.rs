//! Error classification shared across crates
//!
//! Layer-specific error enums stay in their own crates (built with
//! `thiserror`); what they share is the [`ErrorClassification`] contract, so
//! retry and alerting decisions can be made without matching on concrete
//! variants.
//!
//! ```rust,ignore
//! use courier_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug, thiserror::Error)]
//! pub enum FetchError {
//!     #[error("connection reset")]
//!     Reset,
//!     #[error("bad input: {0}")]
//!     Invalid(String),
//! }
//!
//! impl ErrorClassification for FetchError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Self::Reset)
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         match self {
//!             Self::Reset => ErrorSeverity::Warning,
//!             Self::Invalid(_) => ErrorSeverity::Error,
//!         }
//!     }
//! }
//! ```

use std::fmt;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Whether attempting the same operation again may succeed
    ///
    /// Typically transient conditions: lost connections, timeouts, upstream
    /// 5xx responses.
    fn is_retryable(&self) -> bool;

    /// Severity used for logging and alerting decisions
    fn severity(&self) -> ErrorSeverity;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl ErrorSeverity {
    /// Stable lowercase label for structured log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
