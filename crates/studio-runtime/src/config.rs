//! Studio configuration persisted at `~/.craftstudio/config.json`.

use serde::{Deserialize, Serialize};
use shared_types::InstanceId;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use studio_client::endpoint::{parse_ws_url, DEFAULT_HOST, DEFAULT_WS_PORT, WS_PATH};
use studio_client::ClientConfig;
use tracing::{debug, info};

/// Environment variable overriding the config location.
pub const CONFIG_ENV: &str = "CS_CONFIG";

/// Directory under the home directory holding studio state.
pub const CONFIG_DIR: &str = ".craftstudio";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// Id of the instance present in a fresh configuration.
pub const LOCAL_INSTANCE: &str = "local";

/// One configured daemon instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub id: InstanceId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// `ws(s)://host:port/ws`; an API key may be embedded as `?key=`.
    pub url: String,
    /// Connect as soon as the instance is bound.
    #[serde(default)]
    pub auto_connect: bool,
    /// Daemon data directory, used to look up its API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl InstanceConfig {
    pub fn new(id: InstanceId, url: impl Into<String>) -> Self {
        Self {
            name: id.to_string(),
            id,
            url: url.into(),
            auto_connect: false,
            data_dir: None,
        }
    }

    /// The daemon on this machine at the default port.
    pub fn local() -> Self {
        let id = InstanceId::from_static(LOCAL_INSTANCE);
        Self {
            name: "Local daemon".to_string(),
            auto_connect: true,
            ..Self::new(id, format!("ws://{DEFAULT_HOST}:{DEFAULT_WS_PORT}{WS_PATH}"))
        }
    }

    /// Whether switching from `self` to `other` needs a new connection.
    pub fn connection_differs(&self, other: &Self) -> bool {
        self.url != other.url || self.data_dir != other.data_dir
    }
}

/// Everything the studio persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
    /// Instance the UI currently shows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<InstanceId>,
    /// Settings for every client.
    #[serde(default)]
    pub client: ClientConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        let local = InstanceConfig::local();
        Self {
            active: Some(local.id.clone()),
            instances: vec![local],
            client: ClientConfig::default(),
        }
    }
}

impl StudioConfig {
    /// `$CS_CONFIG`, or `~/.craftstudio/config.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write to `path` as pretty JSON, replacing the file atomically.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Encode(e.to_string()))?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, text).map_err(write_err)?;
        fs::rename(&temp, path).map_err(write_err)?;

        info!(path = %path.display(), instances = self.instances.len(), "Saved config");
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if instance.id.as_str().trim().is_empty() {
                return Err(ConfigError::EmptyInstanceId);
            }
            if !seen.insert(&instance.id) {
                return Err(ConfigError::DuplicateInstance(instance.id.clone()));
            }
            parse_ws_url(&instance.url).map_err(|e| ConfigError::InvalidUrl {
                id: instance.id.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(active) = &self.active {
            if !seen.contains(active) {
                return Err(ConfigError::UnknownActive(active.clone()));
            }
        }
        Ok(())
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&InstanceConfig> {
        self.instances.iter().find(|instance| &instance.id == id)
    }

    /// Instances with `auto_connect` set.
    pub fn auto_connect_instances(&self) -> impl Iterator<Item = &InstanceConfig> {
        self.instances.iter().filter(|instance| instance.auto_connect)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode config: {0}")]
    Encode(String),

    #[error("instance id must not be empty")]
    EmptyInstanceId,

    #[error("duplicate instance id '{0}'")]
    DuplicateInstance(InstanceId),

    #[error("instance '{id}' has an invalid url: {reason}")]
    InvalidUrl { id: InstanceId, reason: String },

    #[error("active instance '{0}' is not configured")]
    UnknownActive(InstanceId),

    #[error(transparent)]
    Client(#[from] studio_client::ConfigError),

    #[error("cannot determine home directory")]
    NoHomeDir,
}
