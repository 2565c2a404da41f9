//! # Cadence Telemetry
//!
//! Logging and metrics for Cadence nodes.
//!
//! - **Logs**: `tracing` events rendered by `tracing-subscriber`, pretty for
//!   development and JSON for log shippers.
//! - **Metrics**: Prometheus counters and gauges, rendered by
//!   [`encode_metrics`] for a scrape endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadence_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::from_env())?;
//! ```

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, BLOCKS_FINALIZED, CALLBACKS_DISPATCHED, CALLBACK_DURATION,
    CHAIN_HEIGHT, MEMPOOL_SIZE, MODULE_ERRORS, REGISTRY, TXS_REJECTED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "cadence");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let config = TelemetryConfig {
            log_level: "cadence=loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::Config(_))
        ));
    }
}
