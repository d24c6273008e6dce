//! # Shared Types Crate
//!
//! Domain types shared by every CraftStudio crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: instance identity and connection state are
//!   defined once here and consumed everywhere else.
//! - **Opaque Identity**: an [`InstanceId`] is only ever compared and hashed;
//!   nothing interprets its contents.

pub mod connection;
pub mod entities;
pub mod errors;

pub use connection::ConnectionState;
pub use entities::*;
pub use errors::*;
