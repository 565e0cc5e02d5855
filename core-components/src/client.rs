//! # Client
//!
//! The shared handle every store and component receives. It carries the
//! runtime configuration, acts as the default event source listeners bind to,
//! and drives loading across all registered stores in priority order.

use crate::error::Result;
use crate::store::{LoadSummary, Store};
use core_runtime::config::RuntimeConfig;
use core_runtime::events::{Callback, Emitter, EventSource};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, info};

pub struct Client {
    config: RuntimeConfig,
    emitter: Emitter,
    stores: RwLock<Vec<Weak<dyn Store>>>,
}

impl Client {
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            emitter: Emitter::new(),
            stores: RwLock::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Registers a store for [`Client::load_all`]. The client only keeps a weak reference.
    pub fn register_store<S: Store + 'static>(&self, store: &Arc<S>) {
        let weak: Weak<S> = Arc::downgrade(store);
        let weak: Weak<dyn Store> = weak;
        debug!(store = store.name(), priority = store.priority(), "Registered store");
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(weak);
    }

    /// Live stores, highest priority first. Equal priorities keep registration order.
    pub fn stores(&self) -> Vec<Arc<dyn Store>> {
        let mut stores: Vec<Arc<dyn Store>> = {
            let mut registered = self.stores.write().unwrap_or_else(PoisonError::into_inner);
            registered.retain(|store| store.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };
        stores.sort_by_key(|store| std::cmp::Reverse(store.priority()));
        stores
    }

    /// Loads every registered store, highest priority first.
    ///
    /// Per-source failures are reported through each store's events; only
    /// store-level failures (such as missing discovery) abort.
    pub async fn load_all(&self) -> Result<Vec<(String, LoadSummary)>> {
        let mut summaries = Vec::new();
        for store in self.stores() {
            let summary = store.load_all().await?;
            summaries.push((store.name().to_string(), summary));
        }
        info!(stores = summaries.len(), "Loaded all stores");
        Ok(summaries)
    }
}

impl EventSource for Client {
    fn on(&self, event: &str, callback: Callback) {
        self.emitter.on(event, callback);
    }

    fn once(&self, event: &str, callback: Callback) {
        self.emitter.once(event, callback);
    }

    fn remove_listener(&self, event: &str, callback: &Callback) -> bool {
        self.emitter.remove_listener(event, callback)
    }

    fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter.emit(event, args)
    }

    fn listener_count(&self, event: &str) -> usize {
        self.emitter.listener_count(event)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}
