//! Preference store root handle
//!
//! Binds a root directory, node options and a lock registry together. Nothing
//! here is global: the default store is just a constructor that resolves
//! `~/.prefstore`.

use crate::concurrency::DocumentLockRegistry;
use crate::config::{default_root, StoreConfig};
use crate::error::{PrefsError, Result};
use crate::node::{validate_node_name, NodeOptions, PreferencesNode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct PreferenceStore {
    root: PathBuf,
    options: NodeOptions,
    registry: Arc<DocumentLockRegistry>,
}

impl PreferenceStore {
    /// Create a store with explicit dependencies
    pub fn new(
        root: impl Into<PathBuf>,
        options: NodeOptions,
        registry: Arc<DocumentLockRegistry>,
    ) -> Self {
        Self {
            root: root.into(),
            options,
            registry,
        }
    }

    /// Create a store from configuration, sharing the process-wide registry
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let root = config.root_path()?;
        info!(root = %root.display(), cache = ?config.cache, "Opening preference store");
        Ok(Self::new(
            root,
            config.node_options(),
            DocumentLockRegistry::global(),
        ))
    }

    /// Uncached store rooted at `~/.prefstore`
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(
            default_root()?,
            NodeOptions::default(),
            DocumentLockRegistry::global(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<DocumentLockRegistry> {
        &self.registry
    }

    /// Open the root node
    pub fn root_node(&self) -> Result<PreferencesNode> {
        PreferencesNode::open_with(&self.root, self.options.clone(), self.registry.clone())
    }

    /// Open a nested node by `/`-separated path, creating each level
    ///
    /// Empty segments are skipped, so `"a//b/"` addresses `a/b`. An empty path
    /// addresses the root node.
    pub fn node(&self, path: &str) -> Result<PreferencesNode> {
        if path.starts_with('/') {
            return Err(PrefsError::InvalidNodeName(path.to_string()));
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for segment in &segments {
            validate_node_name(segment)?;
        }

        let mut node = self.root_node()?;
        for segment in segments {
            node = node.child(segment)?;
        }
        Ok(node)
    }
}
