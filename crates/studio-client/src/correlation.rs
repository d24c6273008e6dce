//! Correlation ID for request tracking.
//!
//! A process-local integer matching a request to its eventual response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation ID of one request on one client.
///
/// Unique among that client's outstanding requests; never reused while its
/// request is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// The first id a fresh request table hands out.
    pub const FIRST: Self = Self(1);

    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id after this one, skipping zero on wrap.
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        match self.0.checked_add(1) {
            Some(n) => Self(n),
            None => Self::FIRST,
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
