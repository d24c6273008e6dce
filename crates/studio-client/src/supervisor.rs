//! Connection supervisor.
//!
//! One task per client drives the connection state machine:
//!
//! ```text
//! Disconnected → Connecting → Connected → Disconnected → (delay) → Connecting …
//!                     any state ──destroy──→ Destroyed
//! ```
//!
//! State changes and listener notifications for one client are serialized
//! by a re-entrant notify lock, so a listener may call back into its own
//! client without deadlocking and never observes transitions out of order.

use crate::client::ClientCore;
use crate::config::ReconnectPolicy;
use crate::endpoint::redact;
use crate::error::ClientError;
use crate::pending::RequestTable;
use crate::protocol::ServerEvent;
use crate::transport::{self, Transport};
use parking_lot::{Mutex, ReentrantMutex};
use shared_bus::{EventBus, Subscription};
use shared_types::ConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, info_span, warn, Instrument};

/// Requests from client handles to the supervisor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Drop any socket or pending delay and connect now.
    Reconnect,
    /// Close the socket and stop.
    Shutdown,
}

/// Connection state plus the listeners observing it.
pub(crate) struct ConnectionSupervisor {
    state: Mutex<ConnectionState>,
    listeners: EventBus<bool>,
    notify: ReentrantMutex<()>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl ConnectionSupervisor {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            listeners: EventBus::new(),
            notify: ReentrantMutex::new(()),
            commands: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Whether the supervisor task has been started.
    #[cfg(test)]
    pub(crate) fn is_started(&self) -> bool {
        self.commands.lock().is_some()
    }

    /// Register a connection listener.
    ///
    /// The listener is called once right away with the current connected
    /// flag, then on every transition into or out of `Connected`.
    pub(crate) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let _notify = self.notify.lock();
        listener(self.state().is_connected());
        self.listeners.subscribe(move |connected| listener(*connected))
    }

    /// Ask the task to reconnect. Returns false if it is not running.
    pub(crate) fn request_reconnect(&self) -> bool {
        match self.commands.lock().as_ref() {
            Some(commands) => commands.send(Command::Reconnect).is_ok(),
            None => false,
        }
    }

    /// `Disconnected → Connecting`. False once destroyed.
    fn begin_attempt(&self) -> bool {
        let _notify = self.notify.lock();
        let mut state = self.state.lock();
        if !state.can_transition_to(ConnectionState::Connecting) {
            return false;
        }
        *state = ConnectionState::Connecting;
        true
    }

    /// `Connecting → Disconnected` after an attempt that never opened.
    ///
    /// Listeners are not notified; they never saw `true`.
    fn abandon_attempt(&self) {
        let _notify = self.notify.lock();
        let mut state = self.state.lock();
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Disconnected;
        }
    }

    /// `Connecting → Connected`.
    ///
    /// `send` becomes usable before listeners hear `true`. Returns false if
    /// the client was destroyed while the attempt was in flight.
    fn enter_connected(
        &self,
        transport: &Transport,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> bool {
        let _notify = self.notify.lock();
        {
            let mut state = self.state.lock();
            if !state.can_transition_to(ConnectionState::Connected) {
                return false;
            }
            transport.attach(outbound);
            *state = ConnectionState::Connected;
        }
        info!("Connected");
        self.listeners.publish(true);
        true
    }

    /// `Connected → Disconnected`.
    ///
    /// Listeners hear `false` first, then every pending request is rejected
    /// with `ConnectionClosed`. A no-op once destroyed.
    fn enter_disconnected(&self, transport: &Transport, table: &RequestTable) {
        let _notify = self.notify.lock();
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Connected {
                return;
            }
            transport.detach();
            *state = ConnectionState::Disconnected;
        }
        info!("Disconnected");
        self.listeners.publish(false);
        let rejected = table.reject_all(ClientError::ConnectionClosed);
        if rejected > 0 {
            debug!(rejected, "Rejected requests pending on closed connection");
        }
    }

    /// Enter the terminal state.
    ///
    /// Idempotent. Returns true only for the call that destroyed.
    pub(crate) fn destroy(
        &self,
        transport: &Transport,
        table: &RequestTable,
        events: &EventBus<ServerEvent>,
    ) -> bool {
        let _notify = self.notify.lock();
        let previous = {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return false;
            }
            let previous = *state;
            *state = ConnectionState::Destroyed;
            transport.detach();
            previous
        };

        info!(previous = %previous, "Client destroyed");
        if previous.is_connected() {
            self.listeners.publish(false);
        }
        self.listeners.clear();
        events.clear();
        table.reject_all(ClientError::ClientDestroyed);

        if let Some(commands) = self.commands.lock().take() {
            let _ = commands.send(Command::Shutdown);
        }
        true
    }
}

/// Start the supervisor task for `core` unless it already runs or the
/// client is destroyed.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn start(core: &Arc<ClientCore>) -> bool {
    let supervisor = &core.supervisor;
    let mut slot = supervisor.commands.lock();
    if slot.is_some() || supervisor.state().is_terminal() {
        return false;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    *slot = Some(tx);

    let span = info_span!("rpc_client", instance = %core.instance_id);
    tokio::spawn(run(Arc::clone(core), rx).instrument(span));
    true
}

/// Delay schedule for one client.
#[derive(Debug)]
struct Backoff {
    policy: ReconnectPolicy,
    current: Option<Duration>,
}

impl Backoff {
    fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            current: None,
        }
    }

    fn next_delay(&mut self) -> Duration {
        match &self.policy {
            ReconnectPolicy::Fixed { delay } => *delay,
            ReconnectPolicy::Exponential { initial, max } => {
                let next = match self.current {
                    None => *initial,
                    Some(current) => current.saturating_mul(2).min(*max),
                };
                self.current = Some(next);
                next
            }
        }
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

/// Supervisor task body.
async fn run(core: Arc<ClientCore>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let supervisor = &core.supervisor;
    let mut backoff = Backoff::new(core.config.reconnect.clone());
    let url = redact(&core.url);
    let connect_timeout = core.config.connect_timeout;

    loop {
        if !supervisor.begin_attempt() {
            break;
        }
        debug!(url = %url, "Connecting");

        let attempt = time::timeout(connect_timeout, transport::open(&core.url));
        let opened = tokio::select! {
            result = attempt => result,
            command = commands.recv() => {
                supervisor.abandon_attempt();
                match command {
                    Some(Command::Reconnect) => {
                        info!("Manual reconnect, restarting attempt");
                        continue;
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
        };

        let interrupted = match opened {
            Ok(Ok(stream)) => {
                backoff.reset();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                if !supervisor.enter_connected(&core.transport, outbound_tx) {
                    break;
                }
                let interrupted = transport::pump(
                    stream,
                    outbound_rx,
                    |text| core.dispatch(text),
                    commands.recv(),
                )
                .await;
                supervisor.enter_disconnected(&core.transport, &core.table);
                interrupted
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Connection attempt failed");
                supervisor.abandon_attempt();
                None
            }
            Err(_) => {
                warn!(
                    url = %url,
                    timeout_ms = connect_timeout.as_millis(),
                    "Connection attempt timed out"
                );
                supervisor.abandon_attempt();
                None
            }
        };

        match interrupted {
            Some(Some(Command::Reconnect)) => {
                info!("Manual reconnect");
                continue;
            }
            Some(Some(Command::Shutdown)) | Some(None) => break,
            None => {}
        }

        let delay = backoff.next_delay();
        debug!(delay_ms = delay.as_millis(), "Reconnect scheduled");
        tokio::select! {
            () = time::sleep(delay) => {}
            command = commands.recv() => match command {
                Some(Command::Reconnect) => info!("Manual reconnect, skipping delay"),
                Some(Command::Shutdown) | None => break,
            },
        }
    }

    debug!("Supervisor stopped");
}
