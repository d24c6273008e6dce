//! Client registry - at most one live client per daemon instance.

use crate::client::RpcClient;
use crate::config::{ClientConfig, ConfigError};
use crate::endpoint::redact;
use crate::error::ClientResult;
use parking_lot::Mutex;
use shared_types::InstanceId;
use std::collections::HashMap;
use tracing::{debug, info};

/// Keyed collection of clients, one per instance.
///
/// Mutations are serialized by one lock. When a client is replaced, the
/// caller that replaced it destroys it before returning, so two concurrent
/// `create_client` calls for the same id leave exactly one live client.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<InstanceId, RpcClient>>,
    config: ClientConfig,
}

impl ClientRegistry {
    /// Create a registry using the default client configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose clients use `config`.
    ///
    /// Rejects a config that fails [`ClientConfig::validate`].
    pub fn with_config(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            clients: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Configuration applied to new clients.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create and store a client for `instance_id`.
    ///
    /// Any client already stored for the id is destroyed. The new client is
    /// not connected; call [`RpcClient::connect`] on it.
    pub fn create_client(&self, instance_id: InstanceId, url: &str) -> ClientResult<RpcClient> {
        let client = RpcClient::new(instance_id.clone(), url, self.config.clone())?;

        let replaced = self
            .clients
            .lock()
            .insert(instance_id.clone(), client.clone());

        // Destroyed outside the lock: destroy runs connection listeners.
        if let Some(old) = replaced {
            info!(instance = %instance_id, "Replacing client");
            old.destroy();
        } else {
            debug!(instance = %instance_id, url = %redact(client.url()), "Created client");
        }

        Ok(client)
    }

    /// Look up the client for `instance_id`.
    pub fn get_client(&self, instance_id: &InstanceId) -> Option<RpcClient> {
        self.clients.lock().get(instance_id).cloned()
    }

    /// Destroy and remove the client for `instance_id`, if any.
    ///
    /// Returns whether a client was removed.
    pub fn destroy_client(&self, instance_id: &InstanceId) -> bool {
        let removed = self.clients.lock().remove(instance_id);
        match removed {
            Some(client) => {
                client.destroy();
                debug!(instance = %instance_id, "Destroyed client");
                true
            }
            None => false,
        }
    }

    /// Destroy every client.
    pub fn destroy_all(&self) {
        let drained: Vec<_> = self.clients.lock().drain().collect();
        let count = drained.len();
        for (_, client) in drained {
            client.destroy();
        }
        if count > 0 {
            info!(count, "Destroyed all clients");
        }
    }

    /// Ids with a stored client, sorted.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.clients.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, instance_id: &InstanceId) -> bool {
        self.clients.lock().contains_key(instance_id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

impl Drop for ClientRegistry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
