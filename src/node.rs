//! Preference nodes
//!
//! A node is a directory holding one `root.json` document plus any number of
//! child node directories. Every mutation reads the current document, applies
//! the change in memory and rewrites the whole file while holding the lock
//! registered for that document.

use crate::coerce;
use crate::concurrency::DocumentLockRegistry;
use crate::encode;
use crate::error::{PrefsError, Result};
use crate::fallback::{FallbackDecoder, FallbackRecord};
use crate::types::{CacheMode, Document, DOCUMENT_FILE_NAME};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-node behaviour, inherited by child nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOptions {
    /// Read caching policy
    pub cache: CacheMode,
    /// Write indented JSON
    pub pretty: bool,
}

impl NodeOptions {
    pub fn cached() -> Self {
        Self {
            cache: CacheMode::Cached,
            ..Self::default()
        }
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            cache: CacheMode::Uncached,
            pretty: true,
        }
    }
}

/// Handle to one node of the preferences tree
pub struct PreferencesNode {
    path: PathBuf,
    document_path: PathBuf,
    options: NodeOptions,
    registry: Arc<DocumentLockRegistry>,
    lock: Arc<Mutex<()>>,
    snapshot: Mutex<Option<Document>>,
}

impl PreferencesNode {
    /// Open the node at `path` using the process-wide lock registry
    ///
    /// Creates the directory and an empty `{}` document when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, NodeOptions::default(), DocumentLockRegistry::global())
    }

    /// Open the node at `path` with explicit options and lock registry
    pub fn open_with(
        path: impl AsRef<Path>,
        options: NodeOptions,
        registry: Arc<DocumentLockRegistry>,
    ) -> Result<Self> {
        let requested = path.as_ref();
        if !requested.is_dir() {
            fs::create_dir_all(requested).map_err(|e| PrefsError::io(requested, e))?;
            debug!(path = %requested.display(), "Created node directory");
        }

        let path = dunce::canonicalize(requested).map_err(|e| PrefsError::io(requested, e))?;
        let document_path = path.join(DOCUMENT_FILE_NAME);
        let lock = registry.lock_for(&document_path);

        {
            let _guard = lock.lock();
            if !document_path.exists() {
                fs::write(&document_path, "{}").map_err(|e| PrefsError::io(&document_path, e))?;
                debug!(path = %document_path.display(), "Initialized empty document");
            }
        }

        Ok(Self {
            path,
            document_path,
            options,
            registry,
            lock,
            snapshot: Mutex::new(None),
        })
    }

    /// Node directory (canonical)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of this node's `root.json`
    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.options.cache
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    /// Address the child node `name`, creating it on demand
    ///
    /// The child inherits this node's options and lock registry.
    pub fn child(&self, name: &str) -> Result<PreferencesNode> {
        validate_node_name(name)?;
        PreferencesNode::open_with(
            self.path.join(name),
            self.options.clone(),
            self.registry.clone(),
        )
    }

    /// Names of the immediate child nodes, sorted
    ///
    /// Names are directory base names without extension. Symlinks to
    /// directories count as children. Non-directories are skipped; an
    /// unreadable directory yields no names.
    pub fn list_children(&self) -> Vec<String> {
        walkdir::WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .collect()
    }

    /// Current document
    ///
    /// Never fails: a missing, unreadable or malformed file reads as `{}`.
    pub fn read(&self) -> Document {
        let _guard = self.lock.lock();
        self.read_locked()
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    /// Raw value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().remove(key)
    }

    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| coerce::as_long(&v))
            .unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|v| coerce::as_int(&v))
            .unwrap_or(default)
    }

    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| coerce::as_double(&v))
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| coerce::as_bool(&v))
            .unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| coerce::as_string(&v))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_object(&self, key: &str, default: Document) -> Document {
        match self.get(key) {
            Some(Value::Object(map)) => map,
            _ => default,
        }
    }

    pub fn get_array(&self, key: &str, default: Vec<Value>) -> Vec<Value> {
        match self.get(key) {
            Some(Value::Array(items)) => items,
            _ => default,
        }
    }

    /// Decode the value under `key` into `T`; `None` when absent or mismatched
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Store `value` under `key` and persist the full document
    pub fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<&Self> {
        let value = encode::to_value(value)?;
        self.update(|document| {
            document.insert(key.to_string(), value);
        })?;
        Ok(self)
    }

    /// Store every entry in one read-modify-persist cycle
    pub fn set_all<I, K, V>(&self, entries: I) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| -> Result<(String, Value)> {
                Ok((k.into(), encode::to_value(&v)?))
            })
            .collect::<Result<Vec<_>>>()?;
        self.update(|document| {
            document.extend(entries);
        })?;
        Ok(self)
    }

    /// Remove `key`; an absent key is not an error
    pub fn delete(&self, key: &str) -> Result<&Self> {
        self.update(|document| {
            document.shift_remove(key);
        })?;
        Ok(self)
    }

    /// Copy every key of `other` into this node, overwriting on conflict
    ///
    /// The merge is shallow and `other` is left untouched.
    pub fn merge(&self, other: &PreferencesNode) -> Result<()> {
        let provided = other.read();
        self.update(|document| {
            for (key, value) in provided {
                document.insert(key, value);
            }
        })
    }

    /// Overwrite this node's document with `other`'s
    pub fn replace(&self, other: &PreferencesNode) -> Result<()> {
        let provided = other.read();
        let _guard = self.lock.lock();
        self.persist_locked(provided)
    }

    /// Persist `document` as this node's complete document
    pub fn write_document(&self, document: &Document) -> Result<()> {
        let _guard = self.lock.lock();
        self.persist_locked(document.clone())
    }

    pub fn as_map(&self) -> HashMap<String, Value> {
        self.read().into_iter().collect()
    }

    /// Decode the whole document into a record; unknown fields are ignored
    ///
    /// Unlike [`read`](Self::read), a malformed file is reported.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let _guard = self.lock.lock();
        if self.options.cache == CacheMode::Cached {
            if let Some(document) = self.snapshot.lock().as_ref() {
                return Ok(serde_json::from_value(Value::Object(document.clone()))?);
            }
        }
        let content = fs::read_to_string(&self.document_path)
            .map_err(|e| PrefsError::io(&self.document_path, e))?;
        let value: Value = serde_json::from_str(&content)?;
        if self.options.cache == CacheMode::Cached {
            if let Value::Object(document) = &value {
                *self.snapshot.lock() = Some(document.clone());
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Encode `record` and persist it as the whole document
    pub fn serialize<T: Serialize + ?Sized>(&self, record: &T) -> Result<()> {
        match encode::to_value(record)? {
            Value::Object(document) => {
                let _guard = self.lock.lock();
                self.persist_locked(document)
            }
            _ => Err(PrefsError::NotAnObject {
                path: self.document_path.clone(),
            }),
        }
    }

    /// Decode the document with a fallback decoder, keeping undeclared fields
    pub fn decode_with<T: DeserializeOwned>(
        &self,
        decoder: &FallbackDecoder<T>,
    ) -> Result<FallbackRecord<T>> {
        decoder.decode(&Value::Object(self.read()))
    }

    fn update<F: FnOnce(&mut Document)>(&self, mutate: F) -> Result<()> {
        let _guard = self.lock.lock();
        let mut document = self.read_locked();
        mutate(&mut document);
        self.persist_locked(document)
    }

    fn read_locked(&self) -> Document {
        if self.options.cache == CacheMode::Cached {
            if let Some(document) = self.snapshot.lock().as_ref() {
                trace!(path = %self.document_path.display(), "Serving cached document");
                return document.clone();
            }
        }

        let document = self.load_from_disk();
        if self.options.cache == CacheMode::Cached {
            *self.snapshot.lock() = Some(document.clone());
        }
        document
    }

    fn load_from_disk(&self) -> Document {
        debug!(path = %self.document_path.display(), "Reading preferences document");
        let content = match fs::read_to_string(&self.document_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    path = %self.document_path.display(),
                    error = %e,
                    "Unreadable preferences document, treating as empty"
                );
                return Document::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => document,
            Ok(_) => {
                warn!(
                    path = %self.document_path.display(),
                    "Preferences document is not a JSON object, treating as empty"
                );
                Document::new()
            }
            Err(e) => {
                warn!(
                    path = %self.document_path.display(),
                    error = %e,
                    "Malformed preferences document, treating as empty"
                );
                Document::new()
            }
        }
    }

    fn persist_locked(&self, document: Document) -> Result<()> {
        let bytes = if self.options.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };
        fs::write(&self.document_path, bytes)
            .map_err(|e| PrefsError::io(&self.document_path, e))?;
        debug!(
            path = %self.document_path.display(),
            keys = document.len(),
            "Wrote preferences document"
        );

        if self.options.cache == CacheMode::Cached {
            *self.snapshot.lock() = Some(document);
        }
        Ok(())
    }
}

impl fmt::Debug for PreferencesNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferencesNode")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish()
    }
}

/// Nodes are the same node when they address the same document
impl PartialEq for PreferencesNode {
    fn eq(&self, other: &Self) -> bool {
        self.document_path == other.document_path
    }
}

impl Eq for PreferencesNode {}

/// Reject names that are not a single plain path segment
pub(crate) fn validate_node_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(PrefsError::InvalidNodeName(name.to_string()));
    }
    Ok(())
}
