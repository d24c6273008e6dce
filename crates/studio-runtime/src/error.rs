//! Runtime error types.

use crate::config::ConfigError;
use crate::daemon::DaemonError;
use shared_types::InstanceId;
use studio_client::ClientError;
use thiserror::Error;

/// Errors from binding configured instances to clients.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("unknown instance '{0}'")]
    UnknownInstance(InstanceId),

    #[error("instance '{0}' already exists")]
    DuplicateInstance(InstanceId),

    #[error("API key lookup failed for instance '{id}': {source}")]
    KeyLookup {
        id: InstanceId,
        #[source]
        source: DaemonError,
    },

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type BindingResult<T> = Result<T, BindingError>;
