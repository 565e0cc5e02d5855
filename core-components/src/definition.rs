//! # Component Definitions
//!
//! A source (a file discovered for a store) resolves to at most one
//! [`ComponentDefinition`]. Resolution is pluggable through
//! [`SourceResolver`]; [`RegistryResolver`] is the built-in registry of known
//! definitions keyed by the source's file stem.

use crate::capability::Capability;
use crate::component::Component;
use crate::error::Result;
use crate::store::ComponentStore;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::BridgeError;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Something a store can construct a component from.
pub trait ComponentDefinition<T: Component>: Send + Sync {
    fn name(&self) -> &str;

    /// Every capability this definition is, most general first.
    fn lineage(&self) -> &[Capability];

    /// Builds the component. The component registers itself into `store`.
    fn construct(&self, store: &Arc<ComponentStore<T>>) -> Result<()>;
}

/// Outcome of resolving a source.
pub enum Resolution<T: Component> {
    /// The source exists but defines nothing loadable.
    NoDefinition,
    Definition(Arc<dyn ComponentDefinition<T>>),
}

impl<T: Component> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::NoDefinition => f.write_str("NoDefinition"),
            Resolution::Definition(definition) => f
                .debug_tuple("Definition")
                .field(&definition.name())
                .finish(),
        }
    }
}

#[async_trait]
pub trait SourceResolver<T: Component>: Send + Sync {
    async fn resolve(&self, source: &Path) -> BridgeResult<Resolution<T>>;
}

/// Resolves sources by file stem against a set of registered definitions.
///
/// `listeners/ready.toml` resolves to the definition registered as `ready`.
/// Unknown stems resolve to [`Resolution::NoDefinition`].
pub struct RegistryResolver<T: Component> {
    definitions: RwLock<HashMap<String, Arc<dyn ComponentDefinition<T>>>>,
}

impl<T: Component> Default for RegistryResolver<T> {
    fn default() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Component> RegistryResolver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<D>(self, key: impl Into<String>, definition: D) -> Self
    where
        D: ComponentDefinition<T> + 'static,
    {
        self.register(key, Arc::new(definition));
        self
    }

    /// Registers `definition` under `key`, returning the one it replaced.
    pub fn register(
        &self,
        key: impl Into<String>,
        definition: Arc<dyn ComponentDefinition<T>>,
    ) -> Option<Arc<dyn ComponentDefinition<T>>> {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), definition)
    }

    pub fn len(&self) -> usize {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T: Component> SourceResolver<T> for RegistryResolver<T> {
    async fn resolve(&self, source: &Path) -> BridgeResult<Resolution<T>> {
        let key = source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| BridgeError::SourceNotFound(source.to_path_buf()))?;

        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(match definitions.get(key) {
            Some(definition) => Resolution::Definition(Arc::clone(definition)),
            None => Resolution::NoDefinition,
        })
    }
}
