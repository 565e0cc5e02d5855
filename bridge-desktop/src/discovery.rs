//! Source discovery backed by the local filesystem

use async_trait::async_trait;
use bridge_traits::{
    discovery::SourceDiscovery,
    error::{BridgeError, Result},
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Walks `<root>/<store name>` recursively and reports every matching file.
///
/// Sub-directories are part of the walk, which is what lets a store with
/// `auto_category` enabled derive a category from the parent directory.
/// Results are sorted so load order is deterministic across platforms.
#[derive(Debug, Clone)]
pub struct FsSourceDiscovery {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsSourceDiscovery {
    /// Discover every file below `root`, regardless of extension.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
        }
    }

    /// Restrict discovery to files with one of the given extensions
    /// (without the leading dot). An empty list accepts every file.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

#[async_trait]
impl SourceDiscovery for FsSourceDiscovery {
    async fn discover(&self, store: &str) -> Result<Vec<PathBuf>> {
        let store_dir = self.root.join(store);
        if !fs::try_exists(&store_dir)
            .await
            .map_err(Self::map_io_error)?
        {
            debug!(path = ?store_dir, "Store directory missing, nothing to discover");
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        let mut pending = vec![store_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = fs::read_dir(&dir).await.map_err(Self::map_io_error)?;
            while let Some(entry) = read_dir.next_entry().await.map_err(Self::map_io_error)? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(Self::map_io_error)?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if self.accepts(&path) {
                    sources.push(path);
                }
            }
        }

        sources.sort();
        debug!(path = ?store_dir, count = sources.len(), "Discovered sources");
        Ok(sources)
    }
}
