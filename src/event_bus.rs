//! Progress event fan-out
//!
//! Every observer owns a bounded queue. Publishing serializes the event once and
//! offers it to every queue without waiting; an observer whose queue is full (or
//! whose receiving half is gone) is dropped from the bus.

use crate::types::ProgressEvent;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

/// Shared registry of observer queues (cloneable - the registry is Arc-wrapped)
#[derive(Clone)]
pub struct EventBus {
    observers: Arc<Mutex<Vec<mpsc::Sender<Arc<str>>>>>,
    capacity: usize,
}

/// Receiving end of one observer's queue
///
/// Dropping the subscription disconnects the observer; the bus notices on the
/// next publish.
pub struct Subscription {
    receiver: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    /// Wait for the next serialized event
    ///
    /// Returns `None` once the observer has been dropped from the bus and its
    /// remaining queued events are drained.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }

    /// Consume the subscription as a stream of serialized events
    pub fn into_stream(self) -> ReceiverStream<Arc<str>> {
        ReceiverStream::new(self.receiver)
    }
}

impl EventBus {
    /// Create a bus whose observers each buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.lock().push(sender);
        tracing::debug!(observers = self.observer_count(), "progress observer subscribed");
        Subscription { receiver }
    }

    /// Offer an event to every observer without blocking
    ///
    /// Returns how many observers accepted it.
    pub fn publish(&self, event: &ProgressEvent) -> usize {
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize progress event");
                return 0;
            }
        };

        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|sender| match sender.try_send(payload.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        });
        let delivered = observers.len();

        if delivered < before {
            tracing::debug!(
                dropped = before - delivered,
                remaining = delivered,
                "pruned stalled progress observers"
            );
        }
        delivered
    }

    /// Number of currently registered observers
    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock cannot leave the Vec half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::Sender<Arc<str>>>> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
