//! # Connection State
//!
//! The lifecycle of one daemon connection:
//!
//! ```text
//! Disconnected ──open──→ Connecting ──socket opened──→ Connected
//!      ↑                     │                            │
//!      └──── failed attempt ─┘        socket closed/error │
//!      └──────────────────────────────────────────────────┘
//!
//! any state ──destroy──→ Destroyed (terminal)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of one client, owned by its supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket and no attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open; calls may be sent.
    Connected,
    /// Terminal. No further transitions are possible.
    Destroyed,
}

impl ConnectionState {
    /// Whether calls can be sent in this state.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether this is the terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) | (Connecting, Disconnected) => true,
            (Connected, Disconnected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
