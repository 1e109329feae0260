use prefstore::{CacheMode, DocumentLockRegistry, NodeOptions, PreferenceStore};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn stores(temp_dir: &TempDir) -> (PreferenceStore, PreferenceStore) {
    let root = temp_dir.path().join("prefs");
    let registry = Arc::new(DocumentLockRegistry::new());
    let cached = PreferenceStore::new(&root, NodeOptions::cached(), registry.clone());
    let uncached = PreferenceStore::new(&root, NodeOptions::default(), registry);
    (cached, uncached)
}

#[test]
fn cached_node_is_stale_until_its_own_write() {
    let temp_dir = TempDir::new().unwrap();
    let (cached_store, uncached_store) = stores(&temp_dir);
    let cached = cached_store.node("ui").unwrap();
    let uncached = uncached_store.node("ui").unwrap();

    cached.set("zoom", &100).unwrap();
    assert_eq!(uncached.get_int("zoom", 0), 100);

    // A write from another handle is invisible to the cached snapshot
    uncached.set("zoom", &150).unwrap();
    assert_eq!(uncached.get_int("zoom", 0), 150);
    assert_eq!(cached.get_int("zoom", 0), 100);

    // The cached handle's own write refreshes its snapshot from its own view
    cached.set("sidebar", &true).unwrap();
    assert_eq!(
        Value::Object(cached.read()),
        json!({"zoom": 100, "sidebar": true})
    );
    assert_eq!(
        Value::Object(uncached.read()),
        json!({"zoom": 100, "sidebar": true})
    );
}

#[test]
fn cached_node_delete_refreshes_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let (cached_store, _) = stores(&temp_dir);
    let node = cached_store.node("ui").unwrap();

    node.set_all([("a", 1), ("b", 2)]).unwrap();
    node.delete("a").unwrap();
    assert_eq!(Value::Object(node.read()), json!({"b": 2}));

    let on_disk: Value =
        serde_json::from_str(&fs::read_to_string(node.document_path()).unwrap()).unwrap();
    assert_eq!(on_disk, json!({"b": 2}));
}

#[test]
fn cached_children_inherit_mode() {
    let temp_dir = TempDir::new().unwrap();
    let (cached_store, uncached_store) = stores(&temp_dir);

    let child = cached_store.root_node().unwrap().child("c").unwrap();
    assert_eq!(child.cache_mode(), CacheMode::Cached);
    let child = uncached_store.root_node().unwrap().child("c").unwrap();
    assert_eq!(child.cache_mode(), CacheMode::Uncached);
}

#[test]
fn cached_replace_and_merge_refresh_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let (cached_store, uncached_store) = stores(&temp_dir);
    let target = cached_store.node("target").unwrap();
    let source = uncached_store.node("source").unwrap();

    target.set("old", &1).unwrap();
    source.set("new", &2).unwrap();

    target.replace(&source).unwrap();
    assert_eq!(Value::Object(target.read()), json!({"new": 2}));

    source.set("extra", &3).unwrap();
    target.merge(&source).unwrap();
    assert_eq!(Value::Object(target.read()), json!({"new": 2, "extra": 3}));
}

#[test]
fn cached_deserialize_uses_snapshot() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Ui {
        zoom: u32,
    }

    let temp_dir = TempDir::new().unwrap();
    let (cached_store, _) = stores(&temp_dir);
    let node = cached_store.node("ui").unwrap();
    node.set("zoom", &120).unwrap();
    fs::write(node.document_path(), "garbage").unwrap();

    assert_eq!(node.deserialize::<Ui>().unwrap(), Ui { zoom: 120 });
}
