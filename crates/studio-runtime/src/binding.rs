//! Instance binding.
//!
//! Keeps the client registry in step with the configured instance list:
//! adding an instance creates its client, removing one destroys it, and
//! changing where an instance lives replaces its client.

use crate::config::{ConfigError, InstanceConfig, StudioConfig};
use crate::daemon::{ApiKeySource, DaemonLauncher};
use crate::error::{BindingError, BindingResult};
use parking_lot::Mutex;
use shared_types::{DaemonInfo, DaemonLaunchConfig, InstanceId};
use std::sync::Arc;
use studio_client::endpoint::{parse_ws_url, DEFAULT_HOST, WS_PATH};
use studio_client::{ClientConfig, ClientRegistry, DaemonEndpoint, RpcClient};
use tracing::{debug, info};

#[derive(Default)]
struct BindingState {
    instances: Vec<InstanceConfig>,
    active: Option<InstanceId>,
}

/// Binds configured daemon instances to live clients.
///
/// Methods that may connect a client must be called from within a Tokio
/// runtime.
pub struct InstanceBinding {
    registry: ClientRegistry,
    state: Mutex<BindingState>,
    keys: Arc<dyn ApiKeySource>,
}

impl InstanceBinding {
    /// An empty binding whose clients use `client_config`.
    pub fn new(client_config: ClientConfig, keys: Arc<dyn ApiKeySource>) -> BindingResult<Self> {
        let registry = ClientRegistry::with_config(client_config).map_err(ConfigError::from)?;
        Ok(Self {
            registry,
            state: Mutex::new(BindingState::default()),
            keys,
        })
    }

    /// Bind every instance in `config`, connecting the auto-connect ones.
    pub fn load(config: &StudioConfig, keys: Arc<dyn ApiKeySource>) -> BindingResult<Self> {
        config.validate()?;
        let binding = Self::new(config.client.clone(), keys)?;
        for instance in &config.instances {
            binding.add_instance(instance.clone())?;
        }
        if let Some(active) = &config.active {
            binding.switch_active(active)?;
        }
        Ok(binding)
    }

    /// The URL a client for `instance` connects to, API key included.
    fn connection_url(&self, instance: &InstanceConfig) -> BindingResult<String> {
        let Some(data_dir) = &instance.data_dir else {
            return Ok(parse_ws_url(&instance.url)?.to_string());
        };
        let key = self
            .keys
            .api_key(data_dir)
            .map_err(|source| BindingError::KeyLookup {
                id: instance.id.clone(),
                source,
            })?;

        match key {
            Some(key) => Ok(DaemonEndpoint::parse(&instance.url)?
                .with_api_key(key)
                .url()?
                .to_string()),
            None => Ok(parse_ws_url(&instance.url)?.to_string()),
        }
    }

    /// Add an instance and create its client.
    pub fn add_instance(&self, instance: InstanceConfig) -> BindingResult<RpcClient> {
        let url = self.connection_url(&instance)?;
        {
            let mut state = self.state.lock();
            if state.instances.iter().any(|known| known.id == instance.id) {
                return Err(BindingError::DuplicateInstance(instance.id));
            }
            state.instances.push(instance.clone());
        }

        let client = match self.registry.create_client(instance.id.clone(), &url) {
            Ok(client) => client,
            Err(e) => {
                self.state.lock().instances.retain(|known| known.id != instance.id);
                return Err(e.into());
            }
        };
        info!(instance = %instance.id, auto_connect = instance.auto_connect, "Instance added");

        if instance.auto_connect {
            client.connect();
        }
        Ok(client)
    }

    /// Forget an instance and destroy its client.
    pub fn remove_instance(&self, id: &InstanceId) -> BindingResult<()> {
        {
            let mut state = self.state.lock();
            let before = state.instances.len();
            state.instances.retain(|known| &known.id != id);
            if state.instances.len() == before {
                return Err(BindingError::UnknownInstance(id.clone()));
            }
            if state.active.as_ref() == Some(id) {
                state.active = None;
            }
        }

        self.registry.destroy_client(id);
        info!(instance = %id, "Instance removed");
        Ok(())
    }

    /// Replace an instance's settings.
    ///
    /// The client is re-created when the effective URL changed (address,
    /// data directory, or API key); otherwise only metadata changes.
    pub fn update_instance(&self, instance: InstanceConfig) -> BindingResult<RpcClient> {
        let url = self.connection_url(&instance)?;
        {
            let mut state = self.state.lock();
            let slot = state
                .instances
                .iter_mut()
                .find(|known| known.id == instance.id)
                .ok_or_else(|| BindingError::UnknownInstance(instance.id.clone()))?;
            *slot = instance.clone();
        }

        let client = match self.registry.get_client(&instance.id) {
            Some(client) if client.url().as_str() == url => {
                debug!(instance = %instance.id, "Instance metadata updated");
                client
            }
            _ => {
                info!(instance = %instance.id, "Instance connection changed, replacing client");
                self.registry.create_client(instance.id.clone(), &url)?
            }
        };

        if instance.auto_connect {
            client.connect();
        }
        Ok(client)
    }

    /// Make `id` the instance the UI shows.
    pub fn switch_active(&self, id: &InstanceId) -> BindingResult<RpcClient> {
        {
            let mut state = self.state.lock();
            if !state.instances.iter().any(|known| &known.id == id) {
                return Err(BindingError::UnknownInstance(id.clone()));
            }
            state.active = Some(id.clone());
        }
        debug!(instance = %id, "Active instance switched");
        self.client(id)
    }

    pub fn active(&self) -> Option<InstanceId> {
        self.state.lock().active.clone()
    }

    /// Client of the active instance.
    pub fn active_client(&self) -> Option<RpcClient> {
        let active = self.active()?;
        self.registry.get_client(&active)
    }

    /// Client of instance `id`.
    pub fn client(&self, id: &InstanceId) -> BindingResult<RpcClient> {
        self.registry
            .get_client(id)
            .ok_or_else(|| BindingError::UnknownInstance(id.clone()))
    }

    /// User-triggered connect.
    pub fn connect_instance(&self, id: &InstanceId) -> BindingResult<RpcClient> {
        let client = self.client(id)?;
        client.connect();
        Ok(client)
    }

    /// User-triggered reconnect, skipping any pending delay.
    pub fn reconnect_instance(&self, id: &InstanceId) -> BindingResult<RpcClient> {
        let client = self.client(id)?;
        client.reconnect();
        Ok(client)
    }

    /// Bind a daemon started by the process-management layer.
    ///
    /// The instance id is [`DaemonInfo::instance_id`]; the key comes from the
    /// daemon's data directory.
    pub fn attach_daemon(&self, daemon: &DaemonInfo) -> BindingResult<RpcClient> {
        let id = daemon.instance_id();
        let instance = InstanceConfig {
            name: format!("Daemon {}", daemon.pid),
            auto_connect: true,
            data_dir: Some(daemon.data_dir.clone()),
            ..InstanceConfig::new(id.clone(), local_daemon_url(daemon.ws_port))
        };

        let known = self.state.lock().instances.iter().any(|i| i.id == id);
        if known {
            self.update_instance(instance)
        } else {
            self.add_instance(instance)
        }
    }

    /// Start a daemon through `launcher` and bind it.
    pub async fn launch_daemon(
        &self,
        launcher: &dyn DaemonLauncher,
        config: DaemonLaunchConfig,
    ) -> BindingResult<RpcClient> {
        let daemon = launcher.start_daemon(config).await?;
        info!(pid = daemon.pid, ws_port = daemon.ws_port, "Daemon started");
        self.attach_daemon(&daemon)
    }

    /// Unbind a launched daemon and stop it.
    pub async fn stop_daemon(&self, launcher: &dyn DaemonLauncher, pid: u32) -> BindingResult<()> {
        let id = InstanceId::for_daemon(pid);
        let known = self.state.lock().instances.iter().any(|i| i.id == id);
        if known {
            self.remove_instance(&id)?;
        }
        launcher.stop_daemon(pid).await?;
        info!(pid, "Daemon stopped");
        Ok(())
    }

    /// Configured instances, in insertion order.
    pub fn instances(&self) -> Vec<InstanceConfig> {
        self.state.lock().instances.clone()
    }

    /// Current instance list as a persistable config.
    pub fn to_config(&self) -> StudioConfig {
        let state = self.state.lock();
        StudioConfig {
            instances: state.instances.clone(),
            active: state.active.clone(),
            client: self.registry.config().clone(),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Destroy every client.
    pub fn shutdown(&self) {
        info!(clients = self.registry.len(), "Shutting down instance binding");
        self.registry.destroy_all();
    }
}

/// Connection URL of a daemon on this machine.
pub fn local_daemon_url(ws_port: u16) -> String {
    format!("ws://{DEFAULT_HOST}:{ws_port}{WS_PATH}")
}
