//! # Tracing Subscriber
//!
//! Installs the global `tracing` subscriber.
//!
//! `RUST_LOG` wins when set. Otherwise the filter is
//! `certificate_controller=<LOG_LEVEL>`. `LOG_FORMAT=text` selects the
//! human-readable formatter, anything else JSON.

use crate::config::ControllerConfig;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
#[must_use]
pub fn default_filter(log_level: &str) -> String {
    format!("certificate_controller={log_level}")
}

/// Install the subscriber; returns an error when one is already installed
pub fn init_tracing(config: &ControllerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_logs() {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.with_target(false).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
