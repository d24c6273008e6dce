//! # Core Domain Entities
//!
//! - **Identity**: [`InstanceId`]
//! - **Daemon boundary**: [`DaemonLaunchConfig`], [`DaemonInfo`]

use crate::errors::InstanceIdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque key identifying one configured daemon instance.
///
/// Stable for the lifetime of the instance; used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create an id, rejecting blank strings.
    pub fn new(id: impl Into<String>) -> Result<Self, InstanceIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InstanceIdError::Empty);
        }
        Ok(Self(id))
    }

    /// Create an id from a literal known to be non-blank.
    #[must_use]
    pub fn from_static(id: &'static str) -> Self {
        debug_assert!(!id.trim().is_empty(), "blank instance id literal");
        Self(id.to_string())
    }

    /// Id under which a launched daemon is bound: `daemon-<pid>`.
    #[must_use]
    pub fn for_daemon(pid: u32) -> Self {
        Self(format!("daemon-{pid}"))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for InstanceId {
    type Err = InstanceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parameters handed to the process-management layer to start a daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonLaunchConfig {
    /// Data directory; the launcher picks one when absent.
    pub data_dir: Option<PathBuf>,
    /// WebSocket port; the launcher picks one when absent.
    pub ws_port: Option<u16>,
    /// libp2p listen multiaddr.
    pub listen_addr: Option<String>,
    /// Node capabilities (`client`, `storage`, `relay`, ...).
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// A daemon started by the process-management layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonInfo {
    /// Process (or in-process instance) identifier.
    pub pid: u32,
    /// Port the daemon's WebSocket endpoint listens on.
    pub ws_port: u16,
    /// Directory holding the daemon's state and credential file.
    pub data_dir: PathBuf,
}

impl DaemonInfo {
    /// See [`InstanceId::for_daemon`].
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        InstanceId::for_daemon(self.pid)
    }
}
