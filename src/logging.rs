//! Tracing subscriber bootstrap.

use crate::config::LogConfig;
use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` overrides `config.level`. Calling this again once a subscriber
/// is installed is a no-op.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level `{}`", config.level))?,
    };

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // Losing the race against another initializer is fine.
    if let Err(err) = result {
        if !tracing::dispatcher::has_been_set() {
            return Err(anyhow::anyhow!("failed to install tracing subscriber: {err}"));
        }
    }

    tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    Ok(())
}
