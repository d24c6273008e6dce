//! # Error Types
//!
//! Errors raised while constructing shared domain values.

use thiserror::Error;

/// Errors from building an [`InstanceId`](crate::InstanceId).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceIdError {
    /// The identifier was empty or only whitespace.
    #[error("instance id must not be empty")]
    Empty,
}
