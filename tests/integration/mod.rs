//! Integration tests for the preferences store

mod caching;
mod concurrent_writes;
mod node_tree;
