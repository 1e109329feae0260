use prefstore::{CacheMode, DocumentLockRegistry, NodeOptions, PreferencesNode};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const THREADS: usize = 8;
const KEYS_PER_THREAD: usize = 25;

fn run_concurrent_sets(options: NodeOptions) {
    let temp_dir = TempDir::new().unwrap();
    let node = Arc::new(
        PreferencesNode::open_with(
            temp_dir.path().join("shared"),
            options,
            Arc::new(DocumentLockRegistry::new()),
        )
        .unwrap(),
    );

    let mut handles = vec![];
    for t in 0..THREADS {
        let node = node.clone();
        handles.push(thread::spawn(move || {
            for k in 0..KEYS_PER_THREAD {
                node.set(&format!("t{}-k{}", t, k), &k).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // No update was lost
    assert_eq!(node.keys().len(), THREADS * KEYS_PER_THREAD);
    for t in 0..THREADS {
        for k in 0..KEYS_PER_THREAD {
            assert_eq!(node.get_long(&format!("t{}-k{}", t, k), -1), k as i64);
        }
    }
}

#[test]
fn concurrent_sets_on_one_handle_keep_every_key() {
    run_concurrent_sets(NodeOptions::default());
}

#[test]
fn concurrent_sets_on_cached_handle_keep_every_key() {
    run_concurrent_sets(NodeOptions {
        cache: CacheMode::Cached,
        ..NodeOptions::default()
    });
}

#[test]
fn concurrent_sets_through_separate_handles_keep_every_key() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("shared");
    let registry = Arc::new(DocumentLockRegistry::new());
    PreferencesNode::open_with(&path, NodeOptions::default(), registry.clone()).unwrap();

    let mut handles = vec![];
    for t in 0..THREADS {
        let path = path.clone();
        let registry = registry.clone();
        handles.push(thread::spawn(move || {
            // Each thread opens its own handle to the same document
            let node = PreferencesNode::open_with(&path, NodeOptions::default(), registry).unwrap();
            for k in 0..KEYS_PER_THREAD {
                node.set(&format!("t{}-k{}", t, k), &k).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let node = PreferencesNode::open_with(&path, NodeOptions::default(), registry.clone()).unwrap();
    assert_eq!(node.keys().len(), THREADS * KEYS_PER_THREAD);
    assert_eq!(registry.len(), 1);
}

#[test]
fn concurrent_merges_in_both_directions_do_not_deadlock() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(DocumentLockRegistry::new());
    let a = Arc::new(
        PreferencesNode::open_with(
            temp_dir.path().join("a"),
            NodeOptions::default(),
            registry.clone(),
        )
        .unwrap(),
    );
    let b = Arc::new(
        PreferencesNode::open_with(temp_dir.path().join("b"), NodeOptions::default(), registry)
            .unwrap(),
    );
    a.set("a", &1).unwrap();
    b.set("b", &2).unwrap();

    let mut handles = vec![];
    for i in 0..THREADS {
        let (into, from) = if i % 2 == 0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                into.merge(&from).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(a.has("a") && a.has("b"));
    assert!(b.has("a") && b.has("b"));
}
