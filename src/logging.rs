//! Logging initialization.

use tracing::Level;
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application (default: INFO)
    pub level: Level,
    /// Whether to use json format for logs (default: false)
    pub json_format: bool,
    /// Whether to colorize logs when output is a terminal (default: true)
    pub colorize: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            colorize: true,
        }
    }
}

/// Initialize the logging system with the given configuration.
///
/// `RUST_LOG` overrides the configured level. Repeated initialization
/// (e.g. from tests) is ignored rather than panicking.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(config.colorize)
            .with_timer(ChronoUtc::rfc_3339())
            .boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
