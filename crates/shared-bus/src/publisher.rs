//! # Event Publisher
//!
//! The publishing side of the bus and the listener registry it dispatches to.

use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Callback invoked for every published event.
pub(crate) type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One registered listener.
pub(crate) struct ListenerEntry<T> {
    pub(crate) id: u64,
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) callback: Listener<T>,
}

impl<T> Clone for ListenerEntry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Listener registry shared between the bus and its subscriptions.
pub(crate) struct ListenerRegistry<T> {
    listeners: RwLock<Vec<ListenerEntry<T>>>,
    next_id: AtomicU64,
}

impl<T> ListenerRegistry<T> {
    fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deactivate and drop a listener. Returns false if it was already gone.
    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write();
        let Some(pos) = listeners.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let entry = listeners.swap_remove(pos);
        entry.active.store(false, Ordering::SeqCst);
        true
    }

    fn snapshot(&self) -> Vec<ListenerEntry<T>> {
        self.listeners.read().clone()
    }
}

struct BusInner<T> {
    registry: Arc<ListenerRegistry<T>>,
    sender: broadcast::Sender<T>,
    events_published: AtomicU64,
    capacity: usize,
}

/// In-process event bus.
///
/// Cheap to clone; clones share listeners and streams.
pub struct EventBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Create a bus with the default stream capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose streams buffer up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                registry: Arc::new(ListenerRegistry::new()),
                sender,
                events_published: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Register a callback listener.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let registry = &self.inner.registry;
        let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        registry.listeners.write().push(ListenerEntry {
            id,
            active: Arc::clone(&active),
            callback: Arc::new(listener),
        });

        trace!(listener_id = id, "Listener subscribed");

        Subscription::new(id, active, Arc::downgrade(registry))
    }

    /// Get an async stream of events published after this call.
    #[must_use]
    pub fn stream(&self) -> EventStream<T> {
        EventStream::new(self.inner.sender.subscribe())
    }

    /// Deliver `event` to every current listener and stream.
    ///
    /// Returns the number of callback listeners invoked.
    pub fn publish(&self, event: T) -> usize {
        self.inner.events_published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for entry in self.inner.registry.snapshot() {
            // Re-checked per listener: an earlier listener may have
            // unsubscribed this one.
            if entry.active.load(Ordering::SeqCst) {
                (entry.callback)(&event);
                delivered += 1;
            }
        }

        if self.inner.sender.receiver_count() > 0 {
            let _ = self.inner.sender.send(event);
        }

        delivered
    }

    /// Unsubscribe every listener.
    pub fn clear(&self) {
        let drained: Vec<_> = self.inner.registry.listeners.write().drain(..).collect();
        for entry in &drained {
            entry.active.store(false, Ordering::SeqCst);
        }
        trace!(removed = drained.len(), "Listeners cleared");
    }

    /// Number of registered callback listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.listeners.read().len()
    }

    /// Number of live event streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Total events published.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }

    /// Stream buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
