//! Global subscriber installation.
//!
//! Plain text for terminals, JSON lines for log shippers. Both carry the
//! span fields (`instance`) and event fields (`id`, `method`, `url`) the
//! client crates attach.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Handle returned by [`init_logging`].
///
/// Logs a shutdown line when dropped.
#[derive(Debug)]
pub struct LoggingGuard {
    service_name: String,
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down");
    }
}

/// Build the filter for `config`.
fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::InvalidFilter {
        filter: config.log_level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Only the first call succeeds; later calls return
/// [`TelemetryError::AlreadyInitialised`].
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let filter = env_filter(config)?;

    let installed = if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.show_targets)
                    .with_current_span(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(config.show_targets))
            .try_init()
    };
    installed.map_err(|_| TelemetryError::AlreadyInitialised)?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialised"
    );

    Ok(LoggingGuard {
        service_name: config.service_name.clone(),
    })
}
