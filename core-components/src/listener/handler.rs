//! # Listener Handler
//!
//! Owns the listener store and the registry of named emitters, binds newly
//! loaded listeners and republishes their notifications on a typed bus.

use super::{HandlerEvent, Listener, ListenerOwner};
use crate::capability::Capability;
use crate::client::Client;
use crate::component::Component;
use crate::definition::SourceResolver;
use crate::error::{ComponentError, Result};
use crate::store::{ComponentStore, LoadOutcome, LoadSummary, Store, StoreOptions};
use async_trait::async_trait;
use core_runtime::events::{EventBus, EventSource, EventStream, Receiver};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, info, warn};

/// Name of the store listeners are discovered in.
pub const LISTENER_STORE: &str = "listeners";

/// Outcome of [`ListenerHandler::attach_all`].
#[derive(Debug, Clone, Default)]
pub struct AttachSummary {
    /// Listeners bound by this call.
    pub attached: usize,
    /// Listeners whose bind failed, by name.
    pub failed: Vec<(String, Arc<ComponentError>)>,
}

impl AttachSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ListenerHandler {
    me: Weak<ListenerHandler>,
    store: Arc<ComponentStore<Listener>>,
    emitters: RwLock<HashMap<String, Arc<dyn EventSource>>>,
    events: EventBus<HandlerEvent>,
}

impl ListenerHandler {
    /// Creates the handler with default listener store options and registers
    /// it with the client.
    pub fn new(client: Arc<Client>, resolver: Arc<dyn SourceResolver<Listener>>) -> Arc<Self> {
        let options = StoreOptions::default().with_class_to_handle(Capability::LISTENER);
        Self::with_options(client, resolver, options)
    }

    pub fn with_options(
        client: Arc<Client>,
        resolver: Arc<dyn SourceResolver<Listener>>,
        options: StoreOptions,
    ) -> Arc<Self> {
        let events = EventBus::new(client.config().event_buffer_size);
        let store = ComponentStore::new(Arc::clone(&client), LISTENER_STORE, resolver, options);
        let handler = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            store,
            emitters: RwLock::new(HashMap::new()),
            events,
        });
        client.register_store(&handler);
        handler
    }

    pub fn store(&self) -> &Arc<ComponentStore<Listener>> {
        &self.store
    }

    /// Makes `source` available to listeners configured with `EmitterRef::Named(key)`.
    ///
    /// Returns the emitter previously registered under `key`.
    pub fn register_emitter(
        &self,
        key: impl Into<String>,
        source: Arc<dyn EventSource>,
    ) -> Option<Arc<dyn EventSource>> {
        let key = key.into();
        debug!(emitter = %key, "Registered emitter");
        self.emitters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, source)
    }

    pub fn emitter_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .emitters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn subscribe(&self) -> Receiver<HandlerEvent> {
        self.events.subscribe()
    }

    /// Subscribes to `ListenerError` and `BindFailed` notifications only.
    pub fn failures(&self) -> EventStream<HandlerEvent> {
        EventStream::new(self.events.subscribe()).filter(HandlerEvent::is_failure)
    }

    /// Takes ownership of `listener` and binds it.
    pub fn attach(&self, listener: &Arc<Listener>) -> Result<()> {
        if let Some(me) = self.me.upgrade() {
            listener.set_handler(&me);
        }
        listener.listen()
    }

    /// Attaches every registered listener that is not bound yet.
    ///
    /// A listener that fails to bind does not stop the others. Each failure
    /// is logged, published as `HandlerEvent::BindFailed` and collected in
    /// the returned summary.
    pub fn attach_all(&self) -> AttachSummary {
        let mut summary = AttachSummary::default();
        for listener in self.store.modules() {
            if listener.is_bound() {
                continue;
            }
            match self.attach(&listener) {
                Ok(()) if listener.is_bound() => summary.attached += 1,
                Ok(()) => {}
                Err(err) => {
                    warn!(listener = %listener.name(), error = %err, "Listener failed to bind");
                    let error = Arc::new(err);
                    summary
                        .failed
                        .push((listener.name().to_string(), Arc::clone(&error)));
                    self.notify(HandlerEvent::BindFailed { listener, error });
                }
            }
        }
        summary
    }

    /// Loads one source and binds what it registered.
    pub async fn load(&self, source: &Path) -> LoadOutcome {
        let outcome = self.store.load(source).await;
        if outcome == LoadOutcome::Loaded {
            self.attach_all();
        }
        outcome
    }

    /// Loads every listener source and binds the new listeners.
    ///
    /// Bind failures do not fail the load; they reach subscribers as
    /// `BindFailed`.
    pub async fn load_all(&self) -> Result<LoadSummary> {
        let summary = self.store.load_all().await?;
        let attached = self.attach_all();
        info!(
            attached = attached.attached,
            failed = attached.failed.len(),
            "Listeners attached"
        );
        Ok(summary)
    }

    /// Unbinds and removes a listener.
    pub fn remove(&self, name: &str) -> Option<Arc<Listener>> {
        let listener = self.store.remove(name)?;
        listener.unlisten();
        Some(listener)
    }

    /// Unbinds every listener, keeping them registered.
    pub fn detach_all(&self) -> usize {
        let mut detached = 0;
        for listener in self.store.modules() {
            if listener.is_bound() {
                listener.unlisten();
                detached += 1;
            }
        }
        debug!(detached, "Listeners detached");
        detached
    }
}

impl ListenerOwner for ListenerHandler {
    fn emitter(&self, key: &str) -> Option<Arc<dyn EventSource>> {
        self.emitters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn notify(&self, event: HandlerEvent) {
        self.events.emit(event).ok();
    }
}

#[async_trait]
impl Store for ListenerHandler {
    fn name(&self) -> &str {
        self.store.name()
    }

    fn priority(&self) -> i32 {
        self.store.priority()
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    async fn load_all(&self) -> Result<LoadSummary> {
        ListenerHandler::load_all(self).await
    }
}

impl fmt::Debug for ListenerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandler")
            .field("store", &self.store)
            .field("emitters", &self.emitter_keys())
            .finish_non_exhaustive()
    }
}
