//! Source discovery abstraction.
//!
//! A component store does not know where its sources live. When asked to load
//! everything it owns, it asks a [`SourceDiscovery`] implementation for the
//! list of source references registered under the store's name, then filters
//! and loads them one by one.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// Enumerates component sources for a store.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::discovery::SourceDiscovery;
///
/// async fn count(discovery: &dyn SourceDiscovery) -> Result<usize> {
///     Ok(discovery.discover("listeners").await?.len())
/// }
/// ```
#[async_trait]
pub trait SourceDiscovery: Send + Sync {
    /// List every source that belongs to the store named `store`.
    ///
    /// The returned order is the order in which the store will attempt to load
    /// them. An empty list is not an error.
    async fn discover(&self, store: &str) -> Result<Vec<PathBuf>>;
}
