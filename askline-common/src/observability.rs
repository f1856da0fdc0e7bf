//! Shared observability helpers for binaries and integration tests.
//!
//! The logging initializer centralises our `tracing` setup so that every
//! binary in the workspace emits in the same shape. Call [`init_logging`]
//! once near process start; additional callers are treated as no-ops.
//! Unlike a long-lived desktop/CLI tool, this service runs as a container
//! process, so logs go to stdout rather than a rolling file sink and are
//! picked up by whatever log collector sits in front of the container.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_INIT: OnceLock<()> = OnceLock::new();

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Configuration passed to [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Logical name of the component, used only for error messages.
    pub app_name: &'static str,
    /// Preferred log encoding.
    pub format: LogFormat,
    /// Default filter applied when `RUST_LOG` is unset.
    pub default_filter: &'static str,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "askline",
            format: LogFormat::Text,
            default_filter: "info",
        }
    }
}

impl LogConfig {
    /// Build a [`LogConfig`] matching production conventions: JSON in
    /// production, human-readable text otherwise.
    pub fn for_environment(app_name: &'static str, is_production: bool) -> Self {
        Self {
            app_name,
            format: if is_production {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "info",
        }
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init_logging(config: LogConfig) {
    if LOG_INIT.get().is_some() {
        return;
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_filter));

    let init_result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stdout))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .try_init(),
    };

    if let Err(e) = init_result {
        eprintln!("tracing setup failed for {}: {e}", config.app_name);
    }

    let _ = LOG_INIT.set(());
}
