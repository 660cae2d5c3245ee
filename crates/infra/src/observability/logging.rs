//! Tracing subscriber setup

use anyhow::{anyhow, Result};
use courier_domain::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `config.level`; an unparsable level falls back to
/// `info`. Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);

    let installed = if config.json {
        fmt().with_env_filter(filter).json().with_target(false).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).compact().try_init()
    };

    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
