//! # CraftStudio Test Suite
//!
//! Cross-crate tests that run the client layer against a real WebSocket
//! server in the same process.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support/          # Scriptable mock daemon and waiting helpers
//! └── integration/
//!     ├── scenarios.rs  # Request/response, disconnect, events, destroy
//!     ├── lifecycle.rs  # Timeouts, reconnect policy, listeners
//!     ├── registry.rs   # Multi-instance registry and binding
//!     └── routing.rs    # Out-of-order response routing (proptest)
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p craftstudio-tests
//! cargo test -p craftstudio-tests integration::scenarios::
//! ```

pub mod integration;
pub mod support;
