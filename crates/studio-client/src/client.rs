//! RPC client for one daemon instance.

use crate::config::ClientConfig;
use crate::correlation::CorrelationId;
use crate::endpoint::parse_ws_url;
use crate::error::{ClientError, ClientResult};
use crate::pending::{RequestTable, StatsSnapshot};
use crate::protocol::{RpcMessage, ServerEvent};
use crate::supervisor::{self, ConnectionSupervisor};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_bus::{EventBus, EventStream, Subscription};
use shared_types::{ConnectionState, InstanceId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Everything one client owns. Shared by the handles and the supervisor
/// task.
pub(crate) struct ClientCore {
    pub(crate) instance_id: InstanceId,
    pub(crate) url: Url,
    pub(crate) config: ClientConfig,
    pub(crate) transport: Transport,
    pub(crate) table: RequestTable,
    pub(crate) events: EventBus<ServerEvent>,
    pub(crate) supervisor: ConnectionSupervisor,
}

impl ClientCore {
    /// Route one inbound text frame.
    pub(crate) fn dispatch(&self, text: &str) {
        match RpcMessage::parse(text) {
            Some(RpcMessage::Response { id, outcome }) => {
                let _ = match outcome {
                    Ok(result) => self.table.resolve(id, result),
                    Err(error) => self.table.reject(id, error.into()),
                };
            }
            Some(RpcMessage::Event(event)) => {
                debug!(method = %event.method, "Server event");
                self.events.publish(event);
            }
            Some(RpcMessage::Request { id, method, .. }) => {
                debug!(id = %id, method, "Ignored daemon-initiated request");
            }
            None => debug!(len = text.len(), "Dropped malformed frame"),
        }
    }

    fn destroy(&self) -> bool {
        self.supervisor
            .destroy(&self.transport, &self.table, &self.events)
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> ClientResult<Value> {
        match self.supervisor.state() {
            ConnectionState::Connected => {}
            ConnectionState::Destroyed => return Err(ClientError::ClientDestroyed),
            _ => return Err(ClientError::NotConnected),
        }

        let id = self.table.allocate();
        let response = self.table.register(id, method, timeout);
        let _guard = CancelOnDrop {
            table: &self.table,
            id,
        };

        self.transport
            .send(&RpcMessage::request(id, method, params))?;
        debug!(id = %id, method, "Sent request");

        // The sender only disappears without a value if the table went away.
        response.await.unwrap_or(Err(ClientError::ClientDestroyed))
    }
}

/// Removes a request from the table if its caller stops waiting.
struct CancelOnDrop<'a> {
    table: &'a RequestTable,
    id: CorrelationId,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.table.cancel(self.id);
    }
}

/// Destroys the client when the last handle goes away.
struct ClientHandle {
    core: Arc<ClientCore>,
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.core.destroy();
    }
}

/// Handle to one daemon instance's connection.
///
/// Cheap to clone. Dropping the last clone destroys the client.
#[derive(Clone)]
pub struct RpcClient {
    handle: Arc<ClientHandle>,
}

impl RpcClient {
    /// Create a client for `url`. No socket is opened until
    /// [`connect`](Self::connect).
    ///
    /// Fails with `InvalidConfig` if `config` does not validate.
    pub fn new(instance_id: InstanceId, url: &str, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let url = parse_ws_url(url)?;
        let table = RequestTable::new(config.request_timeout);
        let core = ClientCore {
            instance_id,
            url,
            config,
            transport: Transport::default(),
            table,
            events: EventBus::new(),
            supervisor: ConnectionSupervisor::new(),
        };
        Ok(Self {
            handle: Arc::new(ClientHandle {
                core: Arc::new(core),
            }),
        })
    }

    fn core(&self) -> &Arc<ClientCore> {
        &self.handle.core
    }

    /// Start connecting, and keep reconnecting until destroyed.
    ///
    /// Idempotent; a no-op after [`destroy`](Self::destroy). Must be called
    /// from within a Tokio runtime.
    pub fn connect(&self) {
        supervisor::start(self.core());
    }

    /// Call `method` and decode the result as `R`.
    ///
    /// `params` serializing to `null` (such as `()`) sends no params.
    pub async fn call<P, R>(&self, method: &str, params: P) -> ClientResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.call_with_timeout(method, params, None).await
    }

    /// [`call`](Self::call) with a deadline other than the configured
    /// default.
    pub async fn call_with_timeout<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> ClientResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Null => None,
            value => Some(value),
        };
        let result = self.core().request(method, params, timeout).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Call `method` with raw JSON params and return the raw result.
    ///
    /// Fails with `NotConnected` right away unless connected; nothing is
    /// queued.
    pub async fn call_raw(&self, method: &str, params: Option<Value>) -> ClientResult<Value> {
        self.core().request(method, params, None).await
    }

    /// Listen for connection changes.
    ///
    /// Called once immediately with the current state, then on every
    /// transition.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn on_connection<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.core().supervisor.subscribe(listener)
    }

    /// Listen for server-pushed events.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.core().events.subscribe(listener)
    }

    /// Server-pushed events as an async stream.
    pub fn events(&self) -> EventStream<ServerEvent> {
        self.core().events.stream()
    }

    /// Drop the current socket or pending delay and connect now.
    ///
    /// Starts the client if it was never connected; a no-op after destroy.
    pub fn reconnect(&self) {
        let core = self.core();
        if !core.supervisor.request_reconnect() {
            supervisor::start(core);
        }
    }

    /// Destroy the client.
    ///
    /// Terminal and idempotent: pending calls fail with `ClientDestroyed`,
    /// the socket is closed, no reconnect is attempted, and every listener
    /// is dropped.
    pub fn destroy(&self) {
        self.core().destroy();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.core().supervisor.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Connection URL, including any API key.
    pub fn url(&self) -> &Url {
        &self.core().url
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.core().instance_id
    }

    /// Request outcome counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.core().table.stats()
    }

    /// Number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.core().table.pending_count()
    }

    /// Whether two handles refer to the same client.
    pub fn same_client(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("instance_id", self.instance_id())
            .field("url", &crate::endpoint::redact(self.url()))
            .field("state", &self.state())
            .finish()
    }
}
