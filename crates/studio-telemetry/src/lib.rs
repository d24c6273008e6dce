//! # Studio Telemetry
//!
//! Structured logging setup for CraftStudio binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use studio_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directives |
//! | `CS_JSON_LOGS` | `false` | Emit JSON lines instead of text |
//! | `CS_LOG_TARGETS` | `true` | Include the module target in each line |
//! | `OTEL_SERVICE_NAME` | `craftstudio` | Service name recorded at startup |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("A global logger is already installed")]
    AlreadyInitialised,
}
