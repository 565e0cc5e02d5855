//! # Event Primitives
//!
//! Two kinds of event plumbing live here:
//!
//! - **[`EventSource`] / [`Emitter`]**: named-event emitters. Callbacks are
//!   subscribed to an event name with `on`/`once`, removed by identity with
//!   `remove_listener`, and invoked synchronously, in subscription order, by
//!   `emit`. Listeners bind to these.
//! - **[`EventBus`]**: a typed broadcast bus built on `tokio::sync::broadcast`.
//!   Stores and listener handlers publish their lifecycle events on one so
//!   that any number of observers can subscribe independently.
//!
//! ## Usage
//!
//! ### Subscribing to a named event
//!
//! ```rust
//! use core_runtime::events::{Callback, Emitter, EventSource};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let emitter = Emitter::new();
//! let callback: Callback = Arc::new(|args| println!("ready with {:?}", args));
//!
//! emitter.on("ready", callback.clone());
//! assert!(emitter.emit("ready", &[json!("shard-0")]));
//!
//! assert!(emitter.remove_listener("ready", &callback));
//! assert!(!emitter.emit("ready", &[]));
//! ```
//!
//! ### Observing a typed bus
//!
//! ```rust
//! use core_runtime::events::EventBus;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus: EventBus<String> = EventBus::new(16);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit("loaded".to_string()).ok();
//! assert_eq!(subscriber.recv().await.unwrap(), "loaded");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The typed bus can produce two receive errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: all senders were dropped, i.e. shutdown.
//!
//! `EventBus::emit` returns an error when nobody is subscribed; publishers in
//! this workspace treat that as "nobody cares" and ignore it.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

use core_async::sync::broadcast;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for typed event buses.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Named-event emitters
// ============================================================================

/// A subscribed callback.
///
/// Identity matters: `remove_listener` only removes the exact `Arc` that was
/// subscribed, never "some callback for this event".
pub type Callback = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Returns `true` when both handles point to the same callback allocation.
pub fn same_callback(a: &Callback, b: &Callback) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Anything that supports named-event subscription, unsubscription and
/// publishing.
pub trait EventSource: Send + Sync {
    /// Subscribe `callback` to every future `event`.
    fn on(&self, event: &str, callback: Callback);

    /// Subscribe `callback` to the next `event` only.
    fn once(&self, event: &str, callback: Callback);

    /// Remove one subscription of exactly `callback` from `event`.
    ///
    /// Returns `false` if it was not subscribed (never an error).
    fn remove_listener(&self, event: &str, callback: &Callback) -> bool;

    /// Invoke every callback subscribed to `event` with `args`.
    ///
    /// Returns `true` if the event had subscribers.
    fn emit(&self, event: &str, args: &[Value]) -> bool;

    /// Number of callbacks currently subscribed to `event`.
    fn listener_count(&self, event: &str) -> usize;
}

struct Subscription {
    callback: Callback,
    once: bool,
}

/// In-process named-event emitter.
///
/// Dispatch takes a snapshot of the subscriptions and releases the lock before
/// invoking anything, so callbacks may subscribe, unsubscribe or emit again.
/// `once` subscriptions are removed before their callback runs.
#[derive(Default)]
pub struct Emitter {
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the events that currently have subscribers.
    pub fn event_names(&self) -> Vec<String> {
        let subscriptions = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = subscriptions.keys().cloned().collect();
        names.sort();
        names
    }

    fn subscribe(&self, event: &str, callback: Callback, once: bool) {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions
            .entry(event.to_string())
            .or_default()
            .push(Subscription { callback, once });
        trace!(event, once, "Subscribed callback");
    }
}

impl EventSource for Emitter {
    fn on(&self, event: &str, callback: Callback) {
        self.subscribe(event, callback, false);
    }

    fn once(&self, event: &str, callback: Callback) {
        self.subscribe(event, callback, true);
    }

    fn remove_listener(&self, event: &str, callback: &Callback) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = subscriptions.get_mut(event) else {
            return false;
        };

        // Most recently added first, matching the usual emitter semantics.
        let Some(index) = list
            .iter()
            .rposition(|sub| same_callback(&sub.callback, callback))
        else {
            return false;
        };

        list.remove(index);
        if list.is_empty() {
            subscriptions.remove(event);
        }
        trace!(event, "Removed callback");
        true
    }

    fn emit(&self, event: &str, args: &[Value]) -> bool {
        let callbacks: Vec<Callback> = {
            let mut subscriptions = self
                .subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(list) = subscriptions.get_mut(event) else {
                return false;
            };

            let callbacks = list.iter().map(|sub| Arc::clone(&sub.callback)).collect();
            list.retain(|sub| !sub.once);
            if list.is_empty() {
                subscriptions.remove(event);
            }
            callbacks
        };

        if callbacks.is_empty() {
            return false;
        }

        for callback in &callbacks {
            callback(args);
        }
        true
    }

    fn listener_count(&self, event: &str) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.event_names())
            .finish()
    }
}

// ============================================================================
// Typed Event Bus
// ============================================================================

/// Typed broadcast bus for lifecycle events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; `RuntimeConfig` validation rules that out.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: E) -> Result<usize, SendError<E>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<E> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream};
///
/// let bus: EventBus<u32> = EventBus::new(8);
/// let evens = EventStream::new(bus.subscribe()).filter(|n| n % 2 == 0);
/// ```
pub struct EventStream<E> {
    receiver: Receiver<E>,
    filter: Option<EventFilter<E>>,
}

impl<E: Clone> EventStream<E> {
    pub fn new(receiver: Receiver<E>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<E, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<E, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered matching event.
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(Ok(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl<E> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
