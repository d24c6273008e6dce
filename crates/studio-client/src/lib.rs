//! Studio Client - JSON-RPC 2.0 over WebSocket to CraftStudio daemons.
//!
//! One [`RpcClient`] per daemon instance, looked up by [`InstanceId`] in a
//! [`ClientRegistry`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         RpcClient                             │
//! │  call() ─→ RequestTable ─→ Transport ─────────→ daemon socket │
//! │               ↑  allocate / register / deadline        │      │
//! │               │                                        │      │
//! │          resolve/reject ←── dispatch ←─────── inbound frames  │
//! │                               │                               │
//! │                               └─→ EventBus ─→ on_event()      │
//! │                                                               │
//! │  ConnectionSupervisor task: connect → pump → reconnect delay  │
//! │                             └─→ on_connection(bool)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use studio_client::{ClientRegistry, InstanceId};
//!
//! let registry = ClientRegistry::new();
//! let client = registry.create_client(InstanceId::new("local")?, "ws://127.0.0.1:9091/ws")?;
//! client.connect();
//!
//! let _status = client.on_connection(|connected| println!("connected: {connected}"));
//! let status: serde_json::Value = client.call("status", ()).await?;
//! ```
//!
//! # Failure Model
//!
//! - Calls fail fast with `NotConnected` while disconnected; nothing is queued.
//! - Each request has its own deadline; `Timeout` does not affect the socket.
//! - A dropped socket rejects pending calls with `ConnectionClosed` and is
//!   retried indefinitely until the client is destroyed.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod correlation;
pub mod endpoint;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod registry;
mod supervisor;
mod transport;

pub use client::RpcClient;
pub use config::{ClientConfig, ConfigError, ReconnectPolicy};
pub use correlation::CorrelationId;
pub use endpoint::DaemonEndpoint;
pub use error::{ClientError, ClientResult};
pub use pending::{RequestTable, StatsSnapshot};
pub use protocol::{RpcErrorObject, RpcMessage, ServerEvent};
pub use registry::ClientRegistry;

pub use shared_bus::{EventStream, Subscription};
pub use shared_types::{ConnectionState, InstanceId};
