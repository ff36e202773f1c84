//! Cancellable snapshot subscriptions.
//!
//! A subscription is one end of a channel. The store keeps the
//! [`SnapshotSender`] and pushes a full [`CollectionEvent`] after every
//! committed change; the task store is the single consumer.
//!
//! # Invariants
//! - `cancel()` is idempotent.
//! - After cancellation no event is handed to the consumer, even one already
//!   queued.

use super::CollectionEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Consumer end of a collection subscription.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<CollectionEvent>,
    active: Arc<AtomicBool>,
}

/// Producer end held by a store implementation.
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    sender: Sender<CollectionEvent>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Creates a connected producer/consumer pair.
    pub fn channel() -> (SnapshotSender, Subscription) {
        let (sender, receiver) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        (
            SnapshotSender {
                sender,
                active: active.clone(),
            },
            Subscription { receiver, active },
        )
    }

    /// Returns the next queued event without blocking.
    pub fn try_next(&self) -> Option<CollectionEvent> {
        if !self.is_active() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<CollectionEvent> {
        if !self.is_active() {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(event) if self.is_active() => Some(event),
            Ok(_) | Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every queued event in delivery order.
    pub fn drain(&self) -> Vec<CollectionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }

    /// Stops delivery. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl SnapshotSender {
    /// Pushes one event. Returns `false` once the consumer is gone.
    pub fn send(&self, event: CollectionEvent) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.sender.send(event).is_err() {
            self.active.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
