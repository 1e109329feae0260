//! Prefstore: Hierarchical JSON Preferences
//!
//! A tree of directories where every directory is a node holding one
//! `root.json` document. Nodes read, mutate and rewrite their document under a
//! per-document lock, optionally serving reads from an in-memory snapshot.

pub mod coerce;
pub mod concurrency;
pub mod config;
mod encode;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod node;
pub mod store;
pub mod types;

pub use concurrency::DocumentLockRegistry;
pub use crate::config::StoreConfig;
pub use error::{PrefsError, Result};
pub use fallback::{Extras, FallbackDecoder, FallbackRecord};
pub use node::{NodeOptions, PreferencesNode};
pub use store::PreferenceStore;
pub use types::{CacheMode, Document, DOCUMENT_FILE_NAME};
