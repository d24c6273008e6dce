//! Request table - correlates requests with responses.
//!
//! Maps correlation IDs to waiting callers and enforces a per-request
//! deadline. Every entry is removed exactly once: by a matching response,
//! by its deadline firing, by cancellation, or by a bulk rejection.
//! Removal happens under the table lock, so whichever path removes an entry
//! first is the only one that settles it.

use crate::correlation::CorrelationId;
use crate::error::{ClientError, ClientResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Receiver side handed back to the caller of [`RequestTable::register`].
pub type ResponseReceiver = oneshot::Receiver<ClientResult<Value>>;

/// A request waiting for its response.
struct PendingRequest {
    /// Channel settling the caller's future.
    sender: oneshot::Sender<ClientResult<Value>>,
    /// When the request was registered.
    created_at: Instant,
    /// Method name (for logging and timeout errors).
    method: String,
    /// Deadline measured from `created_at`.
    timeout: Duration,
    /// Deadline timer; aborted when the entry is settled some other way.
    timer: Option<AbortHandle>,
}

/// Counters for request outcomes.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered.
    pub total_registered: AtomicU64,
    /// Total requests resolved with a result.
    pub total_resolved: AtomicU64,
    /// Total requests rejected (remote error, disconnect, destroy).
    pub total_rejected: AtomicU64,
    /// Total requests whose deadline elapsed.
    pub total_timeouts: AtomicU64,
    /// Total requests whose caller went away before settlement.
    pub total_cancelled: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub pending: usize,
}

struct TableInner {
    next_id: CorrelationId,
    entries: HashMap<CorrelationId, PendingRequest>,
}

/// Pending request table for one client.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct RequestTable {
    inner: Arc<Mutex<TableInner>>,
    default_timeout: Duration,
    stats: Arc<PendingStats>,
}

impl RequestTable {
    /// Create a table whose requests default to `default_timeout`.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TableInner {
                next_id: CorrelationId::FIRST,
                entries: HashMap::new(),
            })),
            default_timeout,
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Hand out a fresh id not used by any pending entry.
    pub fn allocate(&self) -> CorrelationId {
        let mut inner = self.inner.lock();
        loop {
            let id = inner.next_id;
            inner.next_id = id.next();
            if !inner.entries.contains_key(&id) {
                return id;
            }
        }
    }

    /// Store a pending request and start its deadline timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(
        &self,
        id: CorrelationId,
        method: &str,
        timeout: Option<Duration>,
    ) -> ResponseReceiver {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let (tx, rx) = oneshot::channel();

        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            method: method.to_string(),
            timeout,
            timer: None,
        };
        if let Some(replaced) = self.inner.lock().entries.insert(id, request) {
            // allocate() never hands out a pending id; this is a caller bug.
            warn!(id = %id, method = replaced.method, "Pending request replaced");
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        // Entry is inserted before the timer exists, so a zero deadline
        // still finds it.
        let weak = Arc::downgrade(&self.inner);
        let stats = Arc::clone(&self.stats);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            expire(&weak, &stats, id);
        })
        .abort_handle();

        match self.inner.lock().entries.get_mut(&id) {
            Some(entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }

        debug!(id = %id, method, timeout_ms = timeout.as_millis(), "Registered pending request");

        rx
    }

    /// Settle a request with its result.
    ///
    /// Returns false if the id is unknown or already settled.
    pub fn resolve(&self, id: CorrelationId, result: Value) -> bool {
        self.settle(id, Ok(result))
    }

    /// Settle a request with an error.
    ///
    /// Returns false if the id is unknown or already settled.
    pub fn reject(&self, id: CorrelationId, error: ClientError) -> bool {
        self.settle(id, Err(error))
    }

    /// Drop a request without notifying its caller.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        let Some(entry) = self.inner.lock().entries.remove(&id) else {
            return false;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(id = %id, method = entry.method, "Cancelled pending request");
        true
    }

    /// Reject every pending request with `reason` and empty the table.
    ///
    /// Idempotent once empty. Returns the number of requests rejected.
    pub fn reject_all(&self, reason: ClientError) -> usize {
        let drained: Vec<_> = self.inner.lock().entries.drain().collect();
        let count = drained.len();

        for (id, entry) in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
            if entry.sender.send(Err(reason.clone())).is_err() {
                debug!(id = %id, method = entry.method, "Pending request receiver dropped");
            }
        }

        if count > 0 {
            debug!(count, reason = %reason, "Rejected all pending requests");
        }
        count
    }

    fn settle(&self, id: CorrelationId, result: ClientResult<Value>) -> bool {
        let Some(entry) = self.inner.lock().entries.remove(&id) else {
            debug!(id = %id, "Response for unknown or settled correlation ID");
            return false;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }

        let counter = if result.is_ok() {
            &self.stats.total_resolved
        } else {
            &self.stats.total_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let elapsed = entry.created_at.elapsed();
        match entry.sender.send(result) {
            Ok(()) => {
                debug!(
                    id = %id,
                    method = entry.method,
                    response_time_ms = elapsed.as_millis(),
                    "Completed pending request"
                );
                true
            }
            Err(_) => {
                debug!(id = %id, method = entry.method, "Pending request receiver dropped");
                false
            }
        }
    }

    /// Number of requests currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether `id` is pending.
    #[must_use]
    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// Deadline applied when a call does not pass its own.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Snapshot of the outcome counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            resolved: self.stats.total_resolved.load(Ordering::Relaxed),
            rejected: self.stats.total_rejected.load(Ordering::Relaxed),
            timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.stats.total_cancelled.load(Ordering::Relaxed),
            pending: self.pending_count(),
        }
    }
}

/// Deadline path: reject `id` with `Timeout` if it is still pending.
fn expire(inner: &Weak<Mutex<TableInner>>, stats: &PendingStats, id: CorrelationId) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let Some(entry) = inner.lock().entries.remove(&id) else {
        return;
    };

    stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
    warn!(
        id = %id,
        method = entry.method,
        timeout_ms = entry.timeout.as_millis(),
        "Pending request timed out"
    );

    let _ = entry.sender.send(Err(ClientError::Timeout {
        method: entry.method,
        after: entry.timeout,
    }));
}
