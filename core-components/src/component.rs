//! Shared component state.
//!
//! Every component kind embeds a [`ComponentBase`] and exposes it through
//! [`Component::base`]. The base carries identity, the enabled flag, an
//! optional category, a weak back-reference to the owning store and the
//! injected [`Client`]. Options a definition leaves unset are filled from the
//! store's [`ComponentDefaults`].

use crate::client::Client;
use crate::store::{ComponentStore, Store};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A named, enable-able unit owned by a store.
pub trait Component: Send + Sync + 'static {
    fn base(&self) -> &ComponentBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn enabled(&self) -> bool {
        self.base().enabled()
    }

    fn category(&self) -> Option<&str> {
        self.base().category()
    }
}

/// Options every component accepts.
///
/// Unset fields fall back to the owning store's [`ComponentDefaults`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentOptions {
    pub name: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ComponentOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: None,
            category: None,
        }
    }
}

/// Store-wide defaults for the components a store constructs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefaults {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ComponentDefaults {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

pub struct ComponentBase {
    name: String,
    enabled: AtomicBool,
    category: Option<String>,
    store: Weak<dyn Store>,
    client: Arc<Client>,
}

impl ComponentBase {
    pub fn new<T: Component>(store: &Arc<ComponentStore<T>>, options: &ComponentOptions) -> Self {
        let client = Arc::clone(store.client());
        let defaults = store.defaults();
        let enabled = options.enabled.or(defaults.enabled).unwrap_or(true);
        let category = options.category.clone().or_else(|| defaults.category.clone());
        let weak: Weak<ComponentStore<T>> = Arc::downgrade(store);
        let store: Weak<dyn Store> = weak;
        Self {
            name: options.name.clone(),
            enabled: AtomicBool::new(enabled),
            category,
            store,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Takes effect on the next lifecycle action; already bound listeners stay bound.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// The owning store, if it is still alive.
    pub fn store(&self) -> Option<Arc<dyn Store>> {
        self.store.upgrade()
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }
}

impl std::fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentBase")
            .field("name", &self.name)
            .field("enabled", &self.enabled())
            .field("category", &self.category)
            .finish()
    }
}
