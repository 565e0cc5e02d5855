//! # Listeners
//!
//! A [`Listener`] is a component that attaches handler methods to named
//! events on an [`EventSource`].
//!
//! ## Lifecycle
//!
//! ```text
//! unbound --listen()--> bound --unlisten()--> unbound
//! ```
//!
//! - `listen` resolves the emitter, wraps each handler method and subscribes
//!   it (`once` or `on`). Disabled or already bound listeners do nothing.
//! - `unlisten` removes exactly the callbacks `listen` subscribed, from the
//!   emitter they were subscribed on.
//!
//! ## Execution isolation
//!
//! Subscribed callbacks never let a handler failure reach the emitter. Each
//! invocation settles into a [`HandlerEvent`] delivered to the owning
//! [`ListenerOwner`]: `ListenerRan` with the returned value or
//! `ListenerError` with the [`ListenerFailure`], including panics and
//! failures of asynchronous handlers. A listener that cannot be bound at all
//! is reported by its handler as `BindFailed`.

mod definition;
mod deferred;
mod handler;
mod methods;

pub use definition::{ListenerDefinition, ListenerOptions};
pub use deferred::{Deferred, HandlerResult};
pub use handler::{AttachSummary, ListenerHandler, LISTENER_STORE};
pub use methods::conventional_method_name;

use crate::component::{Component, ComponentBase};
use crate::error::{panic_message, ComponentError, ListenerFailure, Result};
use crate::store::ComponentStore;
use core_runtime::events::{Callback, EventSource};
use methods::MethodTable;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, trace, warn};

/// A handler method: receives the event arguments.
pub type ListenerMethod = Arc<dyn Fn(&[Value]) -> Deferred + Send + Sync>;

/// Where a listener subscribes.
#[derive(Clone, Default)]
pub enum EmitterRef {
    /// The client every component is given.
    #[default]
    Client,
    /// A key in the owning handler's emitter registry.
    Named(String),
    Source(Arc<dyn EventSource>),
}

impl fmt::Debug for EmitterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitterRef::Client => f.write_str("Client"),
            EmitterRef::Named(key) => f.debug_tuple("Named").field(key).finish(),
            EmitterRef::Source(_) => f.write_str("Source(..)"),
        }
    }
}

/// Notifications a listener sends its owner after each invocation.
#[derive(Debug, Clone)]
pub enum HandlerEvent {
    ListenerRan {
        listener: Arc<Listener>,
        event: String,
        result: Value,
    },
    ListenerError {
        listener: Arc<Listener>,
        event: String,
        error: Arc<ListenerFailure>,
    },
    /// The listener could not be bound while its owner attached listeners.
    BindFailed {
        listener: Arc<Listener>,
        error: Arc<ComponentError>,
    },
}

impl HandlerEvent {
    pub fn listener(&self) -> &Arc<Listener> {
        match self {
            HandlerEvent::ListenerRan { listener, .. }
            | HandlerEvent::ListenerError { listener, .. }
            | HandlerEvent::BindFailed { listener, .. } => listener,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, HandlerEvent::ListenerRan { .. })
    }
}

/// The object managing a set of listeners.
pub trait ListenerOwner: Send + Sync {
    /// Looks up a named emitter.
    fn emitter(&self, key: &str) -> Option<Arc<dyn EventSource>>;

    fn notify(&self, event: HandlerEvent);
}

struct Binding {
    emitter: Arc<dyn EventSource>,
    callbacks: HashMap<String, Callback>,
}

pub struct Listener {
    me: Weak<Listener>,
    base: ComponentBase,
    events: Vec<String>,
    once: bool,
    map: HashMap<String, String>,
    emitter: EmitterRef,
    methods: MethodTable,
    handler: RwLock<Option<Weak<dyn ListenerOwner>>>,
    binding: Mutex<Option<Binding>>,
}

impl Listener {
    /// Builds a listener from its definition and registers it into `store`.
    ///
    /// # Errors
    ///
    /// - [`ComponentError::InvalidConfig`] for an empty or repeated event list
    /// - [`ComponentError::MissingMethod`] when an event has no handler method
    /// - [`ComponentError::Duplicate`] when the name is already registered
    pub fn new(
        store: &Arc<ComponentStore<Listener>>,
        definition: &ListenerDefinition,
    ) -> Result<Arc<Self>> {
        let options = definition.options();
        let name = &options.component.name;

        if options.events.is_empty() {
            return Err(ComponentError::InvalidConfig {
                component: name.clone(),
                reason: "a listener needs at least one event".to_string(),
            });
        }

        let mut seen = HashSet::new();
        if let Some(repeated) = options.events.iter().find(|event| !seen.insert(*event)) {
            return Err(ComponentError::InvalidConfig {
                component: name.clone(),
                reason: format!("event '{}' is listed more than once", repeated),
            });
        }

        let methods = MethodTable::resolve(
            name,
            &options.events,
            &options.map,
            definition.run_method(),
            definition.methods(),
        )?;

        let base = ComponentBase::new(store, &options.component);
        let listener = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            base,
            events: options.events.clone(),
            once: options.once,
            map: options.map.clone(),
            emitter: options.emitter.clone(),
            methods,
            handler: RwLock::new(None),
            binding: Mutex::new(None),
        });

        store.register(Arc::clone(&listener))?;
        Ok(listener)
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn once(&self) -> bool {
        self.once
    }

    pub fn map(&self) -> &HashMap<String, String> {
        &self.map
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    /// Assigns the owner that receives notifications and resolves named emitters.
    pub fn set_handler<O: ListenerOwner + 'static>(&self, owner: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(owner);
        let weak: Weak<dyn ListenerOwner> = weak;
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    pub fn handler(&self) -> Option<Arc<dyn ListenerOwner>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn is_bound(&self) -> bool {
        self.binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Resolves the event source this listener subscribes to.
    ///
    /// # Errors
    ///
    /// - [`ComponentError::HandlerNotAssigned`] for a named emitter without an owner
    /// - [`ComponentError::UnknownEmitter`] when the owner has no emitter under that key
    pub fn emitter(&self) -> Result<Arc<dyn EventSource>> {
        match &self.emitter {
            EmitterRef::Client => {
                let client: Arc<dyn EventSource> = self.base.client().clone();
                Ok(client)
            }
            EmitterRef::Source(source) => Ok(Arc::clone(source)),
            EmitterRef::Named(key) => {
                let handler = self
                    .handler()
                    .ok_or_else(|| ComponentError::HandlerNotAssigned(self.name().to_string()))?;
                handler
                    .emitter(key)
                    .ok_or_else(|| ComponentError::UnknownEmitter(key.clone()))
            }
        }
    }

    /// Subscribes every configured event on the resolved emitter.
    pub fn listen(&self) -> Result<()> {
        if !self.enabled() {
            debug!(listener = %self.name(), "Listener disabled, not binding");
            return Ok(());
        }

        let mut binding = self.binding.lock().unwrap_or_else(PoisonError::into_inner);
        if binding.is_some() {
            trace!(listener = %self.name(), "Listener already bound");
            return Ok(());
        }

        let emitter = self.emitter()?;

        let mut callbacks = HashMap::with_capacity(self.events.len());
        for event in &self.events {
            let method = self.methods.get(event).cloned().ok_or_else(|| {
                ComponentError::MissingMethod {
                    listener: self.name().to_string(),
                    event: event.clone(),
                    method: conventional_method_name(event),
                }
            })?;
            callbacks.insert(event.clone(), self.wrap(event, method));
        }

        for event in &self.events {
            if let Some(callback) = callbacks.get(event) {
                if self.once {
                    emitter.once(event, Arc::clone(callback));
                } else {
                    emitter.on(event, Arc::clone(callback));
                }
            }
        }

        debug!(
            listener = %self.name(),
            events = ?self.events,
            once = self.once,
            "Listener bound"
        );
        *binding = Some(Binding { emitter, callbacks });
        Ok(())
    }

    /// Removes exactly the callbacks subscribed by [`Listener::listen`].
    ///
    /// Returns how many subscriptions were still present. Unbound listeners
    /// remove nothing.
    pub fn unlisten(&self) -> usize {
        let Some(binding) = self
            .binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return 0;
        };

        let mut removed = 0;
        for event in &self.events {
            if let Some(callback) = binding.callbacks.get(event) {
                if binding.emitter.remove_listener(event, callback) {
                    removed += 1;
                }
            }
        }

        debug!(listener = %self.name(), removed, "Listener unbound");
        removed
    }

    fn wrap(&self, event: &str, method: ListenerMethod) -> Callback {
        let listener = self.me.clone();
        let event = event.to_string();
        Arc::new(move |args: &[Value]| {
            if let Some(listener) = listener.upgrade() {
                listener.execute(&event, &method, args);
            }
        })
    }

    fn execute(self: Arc<Self>, event: &str, method: &ListenerMethod, args: &[Value]) {
        let deferred = match catch_unwind(AssertUnwindSafe(|| method(args))) {
            Ok(deferred) => deferred,
            Err(payload) => {
                let failure = ListenerFailure::Panicked(panic_message(payload.as_ref()));
                self.report(event, Err(failure));
                return;
            }
        };

        let event = event.to_string();
        deferred.settle(move |outcome| self.report(&event, outcome));
    }

    fn report(self: &Arc<Self>, event: &str, outcome: std::result::Result<Value, ListenerFailure>) {
        let Some(handler) = self.handler() else {
            if let Err(failure) = &outcome {
                warn!(
                    listener = %self.name(),
                    event,
                    error = %failure,
                    "Listener failed with no handler assigned"
                );
            }
            return;
        };

        let notification = match outcome {
            Ok(result) => {
                trace!(listener = %self.name(), event, "Listener ran");
                HandlerEvent::ListenerRan {
                    listener: Arc::clone(self),
                    event: event.to_string(),
                    result,
                }
            }
            Err(failure) => {
                warn!(listener = %self.name(), event, error = %failure, "Listener failed");
                HandlerEvent::ListenerError {
                    listener: Arc::clone(self),
                    event: event.to_string(),
                    error: Arc::new(failure),
                }
            }
        };
        handler.notify(notification);
    }
}

impl Component for Listener {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name())
            .field("events", &self.events)
            .field("once", &self.once)
            .field("emitter", &self.emitter)
            .field("enabled", &self.enabled())
            .field("bound", &self.is_bound())
            .finish()
    }
}
