//! Configuration loader
//!
//! Loads [`ClientConfig`] from environment variables or a file.
//!
//! ## Loading Strategy
//! 1. Environment variables, when `COURIER_BASE_URL` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. JSON and TOML are both accepted (by file extension)
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `COURIER_BASE_URL` (required): backend origin
//! - `COURIER_TIMEOUT_MS`, `COURIER_UPLOAD_TIMEOUT_MS`
//! - `COURIER_MAX_CONCURRENT_RETRIES`, `COURIER_RETRY_DELAY_MS`
//! - `COURIER_CACHE_TTL_MS`, `COURIER_CACHE_MAX_ENTRIES`
//! - `COURIER_CACHE_BUST` (true/false), `COURIER_CACHE_BUST_PARAM`
//! - `COURIER_INVALID_TOKEN_MARKER`, `COURIER_REFRESH_PATH`
//! - `COURIER_LOGIN_ALERT_RESET_MS`
//! - `COURIER_STORAGE_KEY`, `COURIER_STORAGE_DIR`
//! - `COURIER_USER_AGENT`
//! - `COURIER_LOG_LEVEL`, `COURIER_LOG_JSON`
//!
//! ## File Locations
//! 1. `./courier.{json,toml}`, then `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use courier_domain::{ClientConfig, CourierError, Result};

const FILE_NAMES: [&str; 4] = ["courier.json", "courier.toml", "config.json", "config.toml"];

/// Load configuration, preferring the environment over files.
///
/// # Errors
/// Returns `CourierError::Config` if neither source yields a valid config.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!(base_url = %config.base_url, "Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `COURIER_*` environment variables.
///
/// Only `COURIER_BASE_URL` is required; unset variables keep their defaults.
///
/// # Errors
/// Returns `CourierError::Config` if the base URL is missing or a value does
/// not parse.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig { base_url: env_var("COURIER_BASE_URL")?, ..ClientConfig::default() };

    if let Some(ms) = env_parse::<u64>("COURIER_TIMEOUT_MS")? {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = env_parse::<u64>("COURIER_UPLOAD_TIMEOUT_MS")? {
        config.upload_timeout = Duration::from_millis(ms);
    }
    if let Some(max) = env_parse::<usize>("COURIER_MAX_CONCURRENT_RETRIES")? {
        config.max_concurrent_retries = max;
    }
    if let Some(ms) = env_parse::<u64>("COURIER_RETRY_DELAY_MS")? {
        config.default_retry_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = env_parse::<u64>("COURIER_CACHE_TTL_MS")? {
        config.default_cache_ttl = Duration::from_millis(ms);
    }
    if let Some(max) = env_parse::<usize>("COURIER_CACHE_MAX_ENTRIES")? {
        config.cache_max_entries = Some(max);
    }
    config.cache_bust_enabled = env_bool("COURIER_CACHE_BUST", config.cache_bust_enabled);
    if let Ok(param) = std::env::var("COURIER_CACHE_BUST_PARAM") {
        config.cache_bust_param = param;
    }
    if let Ok(marker) = std::env::var("COURIER_INVALID_TOKEN_MARKER") {
        config.invalid_token_marker = marker;
    }
    if let Ok(path) = std::env::var("COURIER_REFRESH_PATH") {
        config.refresh_path = path;
    }
    if let Some(ms) = env_parse::<u64>("COURIER_LOGIN_ALERT_RESET_MS")? {
        config.login_alert_reset = Duration::from_millis(ms);
    }
    if let Ok(key) = std::env::var("COURIER_STORAGE_KEY") {
        config.storage_key = key;
    }
    if let Ok(dir) = std::env::var("COURIER_STORAGE_DIR") {
        config.storage_dir = Some(PathBuf::from(dir));
    }
    if let Ok(agent) = std::env::var("COURIER_USER_AGENT") {
        config.user_agent = Some(agent);
    }
    if let Ok(level) = std::env::var("COURIER_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("COURIER_LOG_JSON", config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CourierError::Config` if the file is missing, unparsable or
/// invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CourierError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CourierError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CourierError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CourierError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CourierError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CourierError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// First existing config file in the standard locations, if any
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CourierError::Config(format!("Missing required environment variable: {}", key)))
}

/// Optional numeric variable; set but unparsable is an error
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CourierError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{Builder, TempDir};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ENV_KEYS: [&str; 8] = [
        "COURIER_BASE_URL",
        "COURIER_TIMEOUT_MS",
        "COURIER_MAX_CONCURRENT_RETRIES",
        "COURIER_CACHE_BUST",
        "COURIER_STORAGE_DIR",
        "COURIER_LOG_JSON",
        "COURIER_CACHE_MAX_ENTRIES",
        "COURIER_USER_AGENT",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    fn write_config(suffix: &str, contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let mut file = Builder::new().suffix(suffix).tempfile_in(dir.path()).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let (_, path) = file.keep().unwrap();
        (dir, path)
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("COURIER_TEST_BOOL_YES", "YES");
        std::env::set_var("COURIER_TEST_BOOL_OFF", "off");
        std::env::remove_var("COURIER_TEST_BOOL_MISSING");

        assert!(env_bool("COURIER_TEST_BOOL_YES", false));
        assert!(!env_bool("COURIER_TEST_BOOL_OFF", true));
        assert!(env_bool("COURIER_TEST_BOOL_MISSING", true));

        std::env::remove_var("COURIER_TEST_BOOL_YES");
        std::env::remove_var("COURIER_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("COURIER_BASE_URL", "https://api.example.com");
        std::env::set_var("COURIER_TIMEOUT_MS", "5000");
        std::env::set_var("COURIER_MAX_CONCURRENT_RETRIES", "5");
        std::env::set_var("COURIER_CACHE_BUST", "false");
        std::env::set_var("COURIER_STORAGE_DIR", "/tmp/courier");
        std::env::set_var("COURIER_LOG_JSON", "1");
        std::env::set_var("COURIER_USER_AGENT", "courier-test/1.0");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_retries, 5);
        assert!(!config.cache_bust_enabled);
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/courier")));
        assert!(config.logging.json);
        assert_eq!(config.user_agent.as_deref(), Some("courier-test/1.0"));
        assert_eq!(config.refresh_path, "/auth/refresh");
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CourierError::Config(ref msg) if msg.contains("COURIER_BASE_URL")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("COURIER_BASE_URL", "https://api.example.com");
        std::env::set_var("COURIER_TIMEOUT_MS", "soon");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(CourierError::Config(ref msg)) if msg.contains("COURIER_TIMEOUT_MS")));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("COURIER_BASE_URL", "https://api.example.com");
        std::env::set_var("COURIER_CACHE_MAX_ENTRIES", "0");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(CourierError::Config(_))));
    }

    #[test]
    fn test_load_from_file_json() {
        let (_dir, path) = write_config(
            ".json",
            r#"{"base_url": "https://api.example.com", "timeout": 10000, "cache_max_entries": 64}"#,
        );

        let config = load_from_file(Some(path)).expect("config from JSON");

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.cache_max_entries, Some(64));
        assert_eq!(config.upload_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_load_from_file_toml() {
        let (_dir, path) = write_config(
            ".toml",
            r#"
base_url = "http://localhost:3000"
default_cache_ttl = 60000
invalid_token_marker = "invalid access token"

[logging]
level = "debug"
json = true
"#,
        );

        let config = load_from_file(Some(path)).expect("config from TOML");

        assert_eq!(config.default_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.invalid_token_marker, "invalid access token");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_file_validates() {
        let (_dir, path) = write_config(".toml", r#"base_url = "ftp://files.example.com""#);

        assert!(matches!(load_from_file(Some(path)), Err(CourierError::Config(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/courier.json")));
        assert!(matches!(result, Err(CourierError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let (_dir, path) = write_config(".json", r#"{ "base_url": "#);

        assert!(matches!(load_from_file(Some(path)), Err(CourierError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("base_url: x", &PathBuf::from("courier.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
