//! # Studio Runtime
//!
//! Glue between the studio's configuration and the client layer.
//!
//! ## Modules
//!
//! - `config/` - Persisted instance list and client settings
//! - `daemon/` - Process-management boundary (launcher, API keys)
//! - `binding/` - Keeps one live client per configured instance
//!
//! ## Flow
//!
//! ```text
//! config.json ──load──→ StudioConfig ──→ InstanceBinding ──→ ClientRegistry
//!                                              ↑                   │
//!                      DaemonLauncher ─────────┘                   ↓
//!                      (DaemonInfo + api_key)               RpcClient per instance
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod binding;
pub mod config;
pub mod daemon;
pub mod error;

pub use binding::{local_daemon_url, InstanceBinding};
pub use config::{ConfigError, InstanceConfig, StudioConfig};
pub use daemon::{ApiKeySource, DaemonError, DaemonLauncher, FileApiKeySource};
pub use error::{BindingError, BindingResult};
