//! # Event Subscriber
//!
//! Subscription handles and the async stream adapter.

use crate::publisher::ListenerRegistry;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{ready, Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Handle for one callback listener.
///
/// When dropped, the listener is unsubscribed. Use [`Subscription::detach`]
/// to keep the listener for the lifetime of the bus instead.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    unsubscriber: Option<Box<dyn Fn(u64) -> bool + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<T: 'static>(
        id: u64,
        active: Arc<AtomicBool>,
        registry: Weak<ListenerRegistry<T>>,
    ) -> Self {
        let unsubscriber = move |id| match registry.upgrade() {
            Some(registry) => registry.remove(id),
            None => false,
        };
        Self {
            id,
            active,
            unsubscriber: Some(Box::new(unsubscriber)),
        }
    }

    /// Stop receiving events. Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(unsubscriber) = &self.unsubscriber {
            if unsubscriber(self.id) {
                debug!(listener_id = self.id, "Listener unsubscribed");
            }
        }
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Keep the listener registered until the bus is cleared or dropped.
    pub fn detach(mut self) {
        self.unsubscriber = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.unsubscriber.is_some() {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Async stream of published events.
///
/// A consumer that falls more than the bus capacity behind skips the
/// events it missed and continues with the next one.
pub struct EventStream<T> {
    inner: BroadcastStream<T>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub(crate) fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl<T: Clone + Send + 'static> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(event)) => return Poll::Ready(Some(event)),
                Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                    debug!(lagged = count, "Stream lagged, some events dropped");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
