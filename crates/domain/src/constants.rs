//! Client constants
//!
//! Wire-level names and the defaults every [`crate::ClientConfig`] starts
//! from.

// Synthetic result codes
/// No response: connection failure or timeout
pub const NETWORK_ERROR_CODE: i32 = -1;
/// Response body could not be decoded
pub const DECODE_ERROR_CODE: i32 = -2;
/// Unrecoverable authentication failure
pub const AUTH_ERROR_CODE: i32 = 401;

// Headers
/// Carries `Bearer <access token>`
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Per-attempt trace id
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Set to `true` by the backend when auth is disabled
pub const BYPASS_AUTH_HEADER: &str = "X-Bypass-Auth";
/// Forced on mutating requests with structured bodies
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Auth
/// Error-envelope message fragment meaning "access token invalid"
pub const DEFAULT_INVALID_TOKEN_MARKER: &str = "无效的访问令牌";
/// Token renewal endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
/// Key of the persisted token record
pub const DEFAULT_STORAGE_KEY: &str = "user-store";
/// Failsafe re-arm of the session-expired notification
pub const LOGIN_ALERT_RESET_MS: u64 = 5_000;

// Transport
/// Transport timeout for ordinary requests
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Applies to multipart bodies
pub const UPLOAD_TIMEOUT_MS: u64 = 60_000;

// Retry
/// Retries allowed in flight across one client
pub const MAX_CONCURRENT_RETRIES: usize = 3;
/// Delay before the first retry; doubles on each further one
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

// Cache
/// Cached responses live five minutes unless told otherwise
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
/// Timestamp parameter appended to GETs; ignored when fingerprinting
pub const CACHE_BUST_PARAM: &str = "_t";

// Request logging
/// Longest params/body/response text kept in a log event
pub const LOG_TRUNCATE_LIMIT: usize = 1_000;
/// Appended to truncated log text
pub const LOG_TRUNCATE_SUFFIX: &str = "...";
