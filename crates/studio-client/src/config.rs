//! Client configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request deadline used when a call does not pass its own.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between a disconnect and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Upper bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration applied to every client a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default per-request deadline, measured from registration.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How long to wait before each reconnection attempt.
    pub reconnect: ReconnectPolicy,
    /// An attempt that takes longer than this counts as failed.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect_timeout cannot be 0".into(),
            ));
        }

        self.reconnect.validate()
    }
}

/// Reconnection delay strategy.
///
/// Both strategies retry indefinitely; only `destroy` stops a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// The same delay before every attempt.
    Fixed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// Doubling delay per consecutive failed attempt, capped at `max` and
    /// reset after a successful connection.
    Exponential {
        #[serde(with = "humantime_serde")]
        initial: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Fixed { delay } if delay.is_zero() => Err(ConfigError::InvalidReconnect(
                "delay cannot be 0".into(),
            )),
            Self::Exponential { initial, .. } if initial.is_zero() => Err(
                ConfigError::InvalidReconnect("initial delay cannot be 0".into()),
            ),
            Self::Exponential { initial, max } if max < initial => {
                Err(ConfigError::InvalidReconnect(format!(
                    "max delay {max:?} is below initial delay {initial:?}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Invalid reconnection policy
    #[error("invalid reconnect policy: {0}")]
    InvalidReconnect(String),
}
