//! Event bus for the closed taxonomy named in §4.2/§7: `ready`, `error`,
//! `set`, `delete`, `clear`, `close`, plus collection-level `push`/`pull`/`add`.
//!
//! One payload shape per event name (no side-channel listener signatures).
//! Delivery is synchronous and happens after the writer critical section has
//! applied the mutation and the WAL record is durable.

use emberstore_core::Value;
use std::panic::{self, AssertUnwindSafe};

/// One emitted event, carrying its event-specific payload.
#[derive(Debug, Clone)]
pub enum Event {
    /// Engine finished recovery and is open for operations.
    Ready,
    /// A non-fatal error surfaced during a background task.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// A key was written.
    Set {
        /// Key written.
        key: String,
        /// New value.
        value: Value,
        /// Previous value, if any.
        old: Option<Value>,
    },
    /// A key was removed (explicit delete or TTL sweep).
    Delete {
        /// Key removed.
        key: String,
        /// Value that was removed.
        old: Value,
    },
    /// The entire store was cleared.
    Clear,
    /// The engine is shutting down.
    Close,
    /// A collection document had a value appended to an array field.
    Push {
        /// Document key.
        key: String,
        /// Value pushed.
        value: Value,
    },
    /// A collection document had a value removed from an array field.
    Pull {
        /// Document key.
        key: String,
        /// Value pulled.
        value: Value,
    },
    /// A numeric field was incremented or decremented.
    Add {
        /// Document or store key.
        key: String,
        /// Signed delta applied.
        delta: f64,
        /// Resulting value.
        result: f64,
    },
}

/// Subscriber callback, invoked with every emitted event.
pub type EventCallback = Box<dyn FnMut(&Event) + Send>;

/// Subscription id returned by [`EventBus::subscribe`].
pub type SubscriptionId = u64;

/// Fan-out point for engine lifecycle and mutation events.
#[derive(Default)]
pub struct EventBus {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, EventCallback)>,
}

impl EventBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cb` to receive every future event.
    pub fn subscribe(&mut self, cb: EventCallback) -> SubscriptionId {
        self.next_id += 1;
        let id = self.next_id;
        self.subscribers.push((id, cb));
        id
    }

    /// Remove a subscriber by id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(existing, _)| *existing != id);
    }

    /// Deliver `event` to every subscriber, in registration order. A
    /// panicking subscriber is caught and logged, not propagated.
    pub fn emit(&mut self, event: Event) {
        for (id, cb) in self.subscribers.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| cb(&event)));
            if result.is_err() {
                tracing::warn!(subscription_id = id, "event subscriber panicked, isolated from writer");
            }
        }
    }
}
