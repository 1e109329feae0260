//! Core types for the preferences store.

use serde::{Deserialize, Serialize};

/// Document: the JSON object persisted for a node, in insertion order.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// File name of the document inside every node directory.
pub const DOCUMENT_FILE_NAME: &str = "root.json";

/// How a node serves reads, fixed when the node is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Every read re-parses the document from disk
    #[default]
    Uncached,
    /// First read populates a snapshot, refreshed only by the node's own writes
    Cached,
}
