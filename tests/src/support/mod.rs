//! Shared test support: a scriptable mock daemon plus waiting helpers.

mod daemon;

pub use daemon::{DaemonConnection, IncomingRequest, MockDaemon, Reply};

use parking_lot::Mutex;
use shared_types::InstanceId;
use std::sync::Arc;
use std::time::Duration;
use studio_client::{ClientConfig, ReconnectPolicy, RpcClient, Subscription};
use tokio::sync::watch;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn instance(id: &str) -> InstanceId {
    InstanceId::new(id).expect("non-blank id")
}

/// Client settings with a short fixed reconnect delay.
pub fn fast_reconnect(delay: Duration) -> ClientConfig {
    ClientConfig {
        reconnect: ReconnectPolicy::Fixed { delay },
        ..ClientConfig::default()
    }
}

/// Wait until `client` reports `connected`.
pub async fn wait_for_connection(client: &RpcClient, connected: bool) {
    let (tx, mut rx) = watch::channel(!connected);
    let _subscription = client.on_connection(move |state| {
        let _ = tx.send(state);
    });
    tokio::time::timeout(WAIT, rx.wait_for(|state| *state == connected))
        .await
        .unwrap_or_else(|_| panic!("client never reported connected={connected}"))
        .expect("listener dropped");
}

/// Records every connection notification a client delivers.
pub struct ConnectionLog {
    seen: Arc<Mutex<Vec<bool>>>,
    _subscription: Subscription,
}

impl ConnectionLog {
    pub fn attach(client: &RpcClient) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = client.on_connection(move |connected| sink.lock().push(connected));
        Self {
            seen,
            _subscription: subscription,
        }
    }

    pub fn seen(&self) -> Vec<bool> {
        self.seen.lock().clone()
    }
}
