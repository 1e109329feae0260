//! Concurrent access safety for preference documents
//!
//! Provides one lock per canonical document path, so every node handle that
//! addresses the same `root.json` serializes its read-modify-persist cycle
//! against all others in the process. There is no cross-process locking.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static GLOBAL_REGISTRY: OnceLock<Arc<DocumentLockRegistry>> = OnceLock::new();

/// Registry mapping canonical document paths to their mutex
///
/// Locks are created on first request and live as long as the registry.
#[derive(Debug)]
pub struct DocumentLockRegistry {
    locks: RwLock<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DocumentLockRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry shared by nodes opened without an explicit one
    pub fn global() -> Arc<DocumentLockRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(DocumentLockRegistry::new()))
            .clone()
    }

    /// Get or create the lock for a canonical document path
    pub fn lock_for(&self, document: &Path) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(document) {
                return lock.clone();
            }
        }

        // Another thread may have inserted between the two guards.
        let mut map = self.locks.write();
        map.entry(document.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of documents with a registered lock
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

impl Default for DocumentLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
