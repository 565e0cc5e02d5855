//! # Runtime Configuration
//!
//! Provides configuration management for the component core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `RuntimeConfig` that is handed to the client and, through it, to every
//! component store. Validation is fail-fast: an invalid configuration never
//! reaches a store.
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `SourceDiscovery` - Enumerates component sources (desktop default: `FsSourceDiscovery`)
//!
//! When the `desktop-shims` feature is enabled, a filesystem discovery rooted
//! at `base_directory` is injected automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::builder()
//!     .base_directory("./components")
//!     .source_extensions(["toml"])
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::SourceDiscovery;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound for the per-subscriber event buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Runtime configuration shared by the client and every store.
///
/// Use [`RuntimeConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Root directory stores discover their sources under (`<base>/<store name>`)
    pub base_directory: PathBuf,

    /// Buffer size of the store and handler event buses
    pub event_buffer_size: usize,

    /// File extensions considered sources; empty accepts every file
    pub source_extensions: Vec<String>,

    /// Source discovery capability used by `load_all` (optional with desktop default)
    pub discovery: Option<Arc<dyn SourceDiscovery>>,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("base_directory", &self.base_directory)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("source_extensions", &self.source_extensions)
            .field(
                "discovery",
                &self.discovery.as_ref().map(|_| "SourceDiscovery { ... }"),
            )
            .finish()
    }
}

impl RuntimeConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Directory holding the sources of the store named `store`.
    pub fn store_directory(&self, store: &str) -> PathBuf {
        self.base_directory.join(store)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.base_directory.as_os_str().is_empty() {
            return Err(Error::Config("Base directory cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.source_extensions.iter().any(|ext| ext.is_empty()) {
            return Err(Error::Config(
                "Source extensions cannot contain empty entries".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the discovery capability or an actionable error.
    pub fn require_discovery(&self) -> Result<Arc<dyn SourceDiscovery>> {
        self.discovery
            .clone()
            .ok_or_else(discovery_missing_error)
    }
}

fn discovery_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SourceDiscovery".to_string(),
        message: "No SourceDiscovery implementation provided, so stores cannot enumerate sources. \
                 Desktop: enable the 'desktop-shims' feature to use FsSourceDiscovery. \
                 Otherwise: inject one with RuntimeConfigBuilder::discovery()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_discovery(
    base_directory: &Path,
    extensions: &[String],
) -> Option<Arc<dyn SourceDiscovery>> {
    use bridge_desktop::FsSourceDiscovery;

    let discovery: Arc<dyn SourceDiscovery> = Arc::new(
        FsSourceDiscovery::new(base_directory).with_extensions(extensions.iter().cloned()),
    );
    Some(discovery)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_discovery(
    _base_directory: &Path,
    _extensions: &[String],
) -> Option<Arc<dyn SourceDiscovery>> {
    None
}

/// Builder for [`RuntimeConfig`].
#[derive(Default)]
pub struct RuntimeConfigBuilder {
    base_directory: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    source_extensions: Vec<String>,
    discovery: Option<Arc<dyn SourceDiscovery>>,
}

impl RuntimeConfigBuilder {
    /// Sets the root directory sources are discovered under (required).
    pub fn base_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.base_directory = Some(path.into());
        self
    }

    /// Sets the event bus buffer size (default: 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Restricts discovery to the given file extensions.
    pub fn source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_extensions = extensions
            .into_iter()
            .map(|ext| ext.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// Injects a source discovery implementation.
    pub fn discovery(mut self, discovery: Arc<dyn SourceDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Builds the configuration, applying platform defaults and validating.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the base directory is missing or a value
    /// is out of range.
    pub fn build(self) -> Result<RuntimeConfig> {
        let base_directory = self.base_directory.ok_or_else(|| {
            Error::Config(
                "Base directory is required. Use .base_directory() to set it.".to_string(),
            )
        })?;

        let discovery = match self.discovery {
            Some(discovery) => Some(discovery),
            None => provide_default_discovery(&base_directory, &self.source_extensions),
        };

        let config = RuntimeConfig {
            base_directory,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            source_extensions: self.source_extensions,
            discovery,
        };

        config.validate()?;

        Ok(config)
    }
}
