use prefstore::{
    DocumentLockRegistry, NodeOptions, PreferenceStore, PreferencesNode, DOCUMENT_FILE_NAME,
};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn store(temp_dir: &TempDir) -> PreferenceStore {
    PreferenceStore::new(
        temp_dir.path().join("root"),
        NodeOptions::default(),
        Arc::new(DocumentLockRegistry::new()),
    )
}

#[test]
fn on_disk_layout_is_directories_with_root_json() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);

    store.node("app/window").unwrap().set("width", &800).unwrap();

    let root_dir = temp_dir.path().join("root");
    assert!(root_dir.join(DOCUMENT_FILE_NAME).is_file());
    assert!(root_dir.join("app").join(DOCUMENT_FILE_NAME).is_file());
    let window_doc = root_dir.join("app").join("window").join(DOCUMENT_FILE_NAME);
    let parsed: Value = serde_json::from_str(&fs::read_to_string(window_doc).unwrap()).unwrap();
    assert_eq!(parsed, json!({"width": 800}));

    // Parents stay empty documents
    assert_eq!(
        fs::read_to_string(root_dir.join("app").join(DOCUMENT_FILE_NAME)).unwrap(),
        "{}"
    );
}

#[test]
fn separately_opened_handles_see_each_others_writes() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let root = store.root_node().unwrap();

    let first = root.child("a").unwrap();
    let second = root.child("a").unwrap();
    let third = PreferencesNode::open(temp_dir.path().join("root").join("a")).unwrap();

    first.set("from_first", &1).unwrap();
    second.set("from_second", &2).unwrap();
    third.set("from_third", &3).unwrap();

    let expected = json!({"from_first": 1, "from_second": 2, "from_third": 3});
    assert_eq!(Value::Object(first.read()), expected);
    assert_eq!(Value::Object(second.read()), expected);
    assert_eq!(Value::Object(third.read()), expected);
}

#[test]
fn merge_between_sibling_nodes() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let defaults = store.node("defaults").unwrap();
    let user = store.node("user").unwrap();

    defaults
        .set_all([("theme", json!("light")), ("font_size", json!(12))])
        .unwrap();
    user.set("theme", "dark").unwrap();

    let effective = store.node("effective").unwrap();
    effective.replace(&defaults).unwrap();
    effective.merge(&user).unwrap();

    assert_eq!(
        Value::Object(effective.read()),
        json!({"theme": "dark", "font_size": 12})
    );
    assert_eq!(
        Value::Object(defaults.read()),
        json!({"theme": "light", "font_size": 12})
    );
    assert_eq!(
        store.root_node().unwrap().list_children(),
        vec!["defaults", "effective", "user"]
    );
}

#[test]
fn corrupted_document_recovers_on_next_write() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let node = store.node("session").unwrap();
    node.set("token", "abc").unwrap();

    // Simulate a crash mid-write
    fs::write(node.document_path(), "{\"token\": \"ab").unwrap();
    assert!(node.read().is_empty());
    assert_eq!(node.get_string("token", "none"), "none");

    node.set("token", "def").unwrap();
    assert_eq!(Value::Object(node.read()), json!({"token": "def"}));
}

#[test]
fn open_fails_when_path_is_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("occupied");
    fs::write(&file_path, "plain file").unwrap();

    let result = PreferencesNode::open(&file_path);
    assert!(matches!(result, Err(prefstore::PrefsError::Io { .. })));
}
