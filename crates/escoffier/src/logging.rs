//! Tracing subscriber setup.

use crate::LoggingConfig;
use escoffier_error::{ConfigError, EscoffierResult};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter from `RUST_LOG`, falling back to `level`.
pub fn env_filter(level: &str) -> EscoffierResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ConfigError::new(format!("Invalid log filter '{level}': {e}")).into())
}

/// Install the global subscriber: env filter plus text or JSON output.
///
/// With the `observability` feature and `logging.opentelemetry = true`,
/// spans are also exported through OpenTelemetry.
pub fn init_logging(config: &LoggingConfig) -> EscoffierResult<()> {
    if config.opentelemetry {
        #[cfg(feature = "observability")]
        return crate::observability::init_observability_with_config(
            crate::ObservabilityConfig::new(env!("CARGO_PKG_NAME"))
                .with_log_level(config.level.clone())
                .with_json_logs(config.json),
        );
    }

    let filter = env_filter(&config.level)?;
    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::new(format!("Failed to install subscriber: {e}")).into())
}
