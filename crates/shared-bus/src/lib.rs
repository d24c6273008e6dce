//! # Shared Bus - In-Process Event Fan-Out
//!
//! Broadcasts values to any number of interested listeners. Used by the
//! client layer for unsolicited server events and for connection-state
//! notifications.
//!
//! ```text
//!   publish(event)
//!        │
//!        ▼
//! ┌──────────────┐  snapshot   ┌────────────┐
//! │   EventBus   │ ──────────→ │ listener 1 │
//! │              │ ──────────→ │ listener 2 │
//! │              │             └────────────┘
//! │              │  broadcast  ┌────────────┐
//! │              │ ──────────→ │ EventStream│
//! └──────────────┘             └────────────┘
//! ```
//!
//! ## Dispatch Semantics
//!
//! - Every listener subscribed when `publish` starts receives the event
//!   exactly once.
//! - Dispatch iterates a snapshot, so listeners that subscribe or
//!   unsubscribe during dispatch never cause other listeners to be skipped.
//! - A listener that unsubscribes during dispatch receives nothing further,
//!   including the remainder of the dispatch in progress.
//! - Listeners run on the publishing thread; no bus lock is held while they
//!   run, so a listener may call back into the bus.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;

pub use publisher::EventBus;
pub use subscriber::{EventStream, Subscription};

/// Events buffered per stream subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
