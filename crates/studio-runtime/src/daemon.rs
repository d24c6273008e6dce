//! Daemon process boundary.
//!
//! Starting and stopping daemon processes belongs to the process-management
//! layer. The runtime only needs what comes out of it: the WebSocket port of
//! a started daemon and, when the daemon requires one, its API key.

use async_trait::async_trait;
use shared_types::{DaemonInfo, DaemonLaunchConfig};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the credential file a daemon writes into its data directory.
pub const API_KEY_FILE: &str = "api_key";

/// Errors from the process-management layer.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to start daemon: {0}")]
    Start(String),

    #[error("no running daemon with pid {0}")]
    UnknownPid(u32),

    #[error("failed to stop daemon {pid}: {reason}")]
    Stop { pid: u32, reason: String },

    #[error("failed to read API key from {}: {source}", .path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Starts, stops, and lists daemon processes.
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    /// Start a daemon and report where it listens.
    async fn start_daemon(&self, config: DaemonLaunchConfig) -> Result<DaemonInfo, DaemonError>;

    /// Stop the daemon with `pid`.
    async fn stop_daemon(&self, pid: u32) -> Result<(), DaemonError>;

    /// Daemons started by this launcher that are still running.
    async fn list_running_daemons(&self) -> Result<Vec<DaemonInfo>, DaemonError>;
}

/// Resolves the API key a daemon expects, given its data directory.
///
/// `Ok(None)` means the daemon does not require a key.
pub trait ApiKeySource: Send + Sync {
    fn api_key(&self, data_dir: &Path) -> Result<Option<String>, DaemonError>;
}

/// Reads `<data_dir>/api_key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileApiKeySource;

impl ApiKeySource for FileApiKeySource {
    fn api_key(&self, data_dir: &Path) -> Result<Option<String>, DaemonError> {
        let path = data_dir.join(API_KEY_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let key = contents.trim();
                if key.is_empty() {
                    debug!(path = %path.display(), "API key file is empty");
                    Ok(None)
                } else {
                    Ok(Some(key.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DaemonError::KeyRead { path, source }),
        }
    }
}
