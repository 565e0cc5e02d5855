//! # Component Store
//!
//! A typed registry that discovers sources, resolves them to definitions,
//! checks each definition's lineage against the capability the store handles
//! and constructs the component.
//!
//! ## Failure reporting
//!
//! A failing source never aborts loading. Every failure is wrapped in
//! [`ComponentError::Parse`] and published once as [`StoreEvent::Error`];
//! [`ComponentStore::load`] itself only reports a [`LoadOutcome`].
//!
//! ```ignore
//! let store = ComponentStore::new(client, "listeners", resolver, StoreOptions::default());
//! let mut events = store.subscribe();
//!
//! store.load(Path::new("components/listeners/ready.toml")).await;
//! ```

use crate::capability::Capability;
use crate::client::Client;
use crate::component::{Component, ComponentDefaults};
use crate::definition::{Resolution, SourceResolver};
use crate::error::{panic_message, ComponentError, Result};
use async_trait::async_trait;
use core_runtime::events::{EventBus, Receiver};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, info, instrument, warn};

/// Decides whether a discovered source gets loaded.
pub type LoadFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Store options. Values set through the `with_*` methods win over the defaults.
#[derive(Clone)]
pub struct StoreOptions {
    pub priority: i32,
    pub class_to_handle: Capability,
    pub auto_category: bool,
    pub load_filter: LoadFilter,
    /// Applied under the options of every component this store constructs.
    pub defaults: ComponentDefaults,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            priority: -1,
            class_to_handle: Capability::COMPONENT,
            auto_category: false,
            load_filter: Arc::new(|_| true),
            defaults: ComponentDefaults::default(),
        }
    }
}

impl StoreOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_class_to_handle(mut self, capability: Capability) -> Self {
        self.class_to_handle = capability;
        self
    }

    pub fn with_auto_category(mut self, auto_category: bool) -> Self {
        self.auto_category = auto_category;
        self
    }

    pub fn with_load_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.load_filter = Arc::new(filter);
        self
    }

    pub fn with_defaults(mut self, defaults: ComponentDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("priority", &self.priority)
            .field("class_to_handle", &self.class_to_handle)
            .field("auto_category", &self.auto_category)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum StoreEvent {
    Registered { name: String },
    Removed { name: String },
    Error {
        path: PathBuf,
        error: Arc<ComponentError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    NoDefinition,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub discovered: usize,
    pub filtered: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Type-erased view of a store, used by the client to load stores of any
/// component kind.
#[async_trait]
pub trait Store: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load_all(&self) -> Result<LoadSummary>;
}

pub struct ComponentStore<T: Component> {
    me: Weak<Self>,
    client: Arc<Client>,
    name: String,
    modules: RwLock<HashMap<String, Arc<T>>>,
    options: StoreOptions,
    resolver: Arc<dyn SourceResolver<T>>,
    events: EventBus<StoreEvent>,
}

impl<T: Component> ComponentStore<T> {
    pub fn new(
        client: Arc<Client>,
        name: impl Into<String>,
        resolver: Arc<dyn SourceResolver<T>>,
        options: StoreOptions,
    ) -> Arc<Self> {
        let events = EventBus::new(client.config().event_buffer_size);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            client,
            name: name.into(),
            modules: RwLock::new(HashMap::new()),
            options,
            resolver,
            events,
        })
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.options.priority
    }

    pub fn class_to_handle(&self) -> Capability {
        self.options.class_to_handle
    }

    pub fn auto_category(&self) -> bool {
        self.options.auto_category
    }

    pub fn defaults(&self) -> &ComponentDefaults {
        &self.options.defaults
    }

    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Category implied by a source's location: its parent directory name.
    ///
    /// `None` unless `auto_category` is set, or when the source sits directly
    /// in the store directory.
    pub fn category_of(&self, source: &Path) -> Option<String> {
        if !self.options.auto_category {
            return None;
        }

        let parent = source.parent()?;
        let category = parent.file_name()?.to_str()?;
        if category == self.name {
            return None;
        }
        Some(category.to_string())
    }

    /// Adds a constructed component. Names are unique within a store.
    pub fn register(&self, component: Arc<T>) -> Result<()> {
        let name = component.name().to_string();
        {
            let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
            if modules.contains_key(&name) {
                return Err(ComponentError::Duplicate(name));
            }
            modules.insert(name.clone(), component);
        }

        debug!(store = %self.name, component = %name, "Registered component");
        self.events.emit(StoreEvent::Registered { name }).ok();
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        let removed = self
            .modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)?;

        debug!(store = %self.name, component = %name, "Removed component");
        self.events
            .emit(StoreEvent::Removed {
                name: name.to_string(),
            })
            .ok();
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Snapshot of the registered components.
    pub fn modules(&self) -> Vec<Arc<T>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads one source.
    ///
    /// Never fails: errors are published as [`StoreEvent::Error`] and reported
    /// as [`LoadOutcome::Failed`].
    #[instrument(skip(self, source), fields(store = %self.name, source = %source.display()))]
    pub async fn load(&self, source: &Path) -> LoadOutcome {
        match self.try_load(source).await {
            Ok(true) => LoadOutcome::Loaded,
            Ok(false) => {
                debug!("Source defines no component");
                LoadOutcome::NoDefinition
            }
            Err(cause) => {
                let error = ComponentError::Parse {
                    path: source.display().to_string(),
                    cause: Box::new(cause),
                };
                warn!(
                    error = %error,
                    cause = %error.cause().map(ToString::to_string).unwrap_or_default(),
                    "Failed to load component"
                );
                self.events
                    .emit(StoreEvent::Error {
                        path: source.to_path_buf(),
                        error: Arc::new(error),
                    })
                    .ok();
                LoadOutcome::Failed
            }
        }
    }

    async fn try_load(&self, source: &Path) -> Result<bool> {
        let definition = match self
            .resolver
            .resolve(source)
            .await
            .map_err(ComponentError::Resolution)?
        {
            Resolution::NoDefinition => return Ok(false),
            Resolution::Definition(definition) => definition,
        };

        let class_to_handle = self.options.class_to_handle;
        if !definition.lineage().contains(&class_to_handle) {
            return Err(ComponentError::IllegalState(format!(
                "Definition '{}' is not a {}",
                definition.name(),
                class_to_handle
            )));
        }

        let store = self.me.upgrade().ok_or_else(|| {
            ComponentError::IllegalState(format!("Store '{}' was dropped while loading", self.name))
        })?;

        match catch_unwind(AssertUnwindSafe(|| definition.construct(&store))) {
            Ok(constructed) => constructed?,
            Err(payload) => {
                return Err(ComponentError::Construction(anyhow::anyhow!(
                    "constructor panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }
        }

        debug!(
            definition = definition.name(),
            category = ?self.category_of(source),
            "Constructed component"
        );
        Ok(true)
    }

    /// Discovers this store's sources and loads each accepted one.
    ///
    /// # Errors
    ///
    /// Fails only when sources cannot be enumerated (missing discovery
    /// capability or a discovery error). Individual source failures are
    /// counted in the summary.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn load_all(&self) -> Result<LoadSummary> {
        let discovery = self.client.config().require_discovery()?;
        let sources = discovery
            .discover(&self.name)
            .await
            .map_err(ComponentError::Discovery)?;

        let mut summary = LoadSummary {
            discovered: sources.len(),
            ..LoadSummary::default()
        };

        for source in &sources {
            if !(self.options.load_filter)(source) {
                debug!(source = %source.display(), "Source rejected by load filter");
                summary.filtered += 1;
                continue;
            }

            match self.load(source).await {
                LoadOutcome::Loaded => summary.loaded += 1,
                LoadOutcome::NoDefinition => summary.skipped += 1,
                LoadOutcome::Failed => summary.failed += 1,
            }
        }

        info!(
            discovered = summary.discovered,
            loaded = summary.loaded,
            skipped = summary.skipped,
            filtered = summary.filtered,
            failed = summary.failed,
            "Loaded store"
        );
        Ok(summary)
    }
}

#[async_trait]
impl<T: Component> Store for ComponentStore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.options.priority
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    async fn load_all(&self) -> Result<LoadSummary> {
        ComponentStore::load_all(self).await
    }
}

impl<T: Component> fmt::Debug for ComponentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("modules", &self.names())
            .finish_non_exhaustive()
    }
}
