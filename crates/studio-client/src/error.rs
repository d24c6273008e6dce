//! Client error taxonomy.
//!
//! Every failure reaches the original caller through its own call future;
//! there is no central error channel. Connection loss is reported to
//! listeners as a state change, not as an error.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`RpcClient`](crate::RpcClient) calls.
///
/// `Clone` so a single bulk cause can be fanned out to every pending request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The socket is not in the `Connected` state. Nothing was sent.
    #[error("not connected to daemon")]
    NotConnected,

    /// The request's deadline elapsed with no matching response.
    #[error("request '{method}' timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Method of the timed-out request.
        method: String,
        /// The deadline the request was registered with.
        after: Duration,
    },

    /// The socket closed or failed while the request was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// The client was destroyed while the request was pending, or before
    /// the call was made.
    #[error("client destroyed")]
    ClientDestroyed,

    /// The daemon answered with a JSON-RPC error object.
    #[error("remote error {code}: {message}")]
    Remote {
        /// Daemon-defined error code.
        code: i64,
        /// Daemon-defined message.
        message: String,
        /// Optional daemon-defined payload.
        data: Option<serde_json::Value>,
    },

    /// Params could not be encoded, or the result could not be decoded
    /// into the requested type.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The daemon endpoint could not be turned into a WebSocket URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The client configuration failed validation.
    #[error("invalid client config: {0}")]
    InvalidConfig(#[from] crate::config::ConfigError),
}

impl ClientError {
    /// Whether the caller should simply try again once connected.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionClosed)
    }

    /// Whether this is a daemon-reported error.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<crate::protocol::RpcErrorObject> for ClientError {
    fn from(e: crate::protocol::RpcErrorObject) -> Self {
        Self::Remote {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
