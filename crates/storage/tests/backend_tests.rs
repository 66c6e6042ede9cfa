//! Integration tests for storage backends (sled and in-memory).
//! Both backends must agree on point reads, ordered prefix scans, batch
//! application and cache-and-commit behaviour.

use bwhub_storage::{CacheStore, KvStore, KvStoreExt, MemoryStore, SledStore};
use tempfile::TempDir;

fn seed<S: KvStore>(store: &mut S) {
    store.set(&[0x20, 3], b"node-3".to_vec()).unwrap();
    store.set(&[0x20, 1], b"node-1".to_vec()).unwrap();
    store.set(&[0x20, 2], b"node-2".to_vec()).unwrap();
    store.set(&[0x30, 1], b"plan-1".to_vec()).unwrap();
}

fn assert_backend_semantics<S: KvStore>(store: &mut S) {
    seed(store);

    let nodes: Vec<Vec<u8>> = store
        .scan_prefix(&[0x20])
        .unwrap()
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    assert_eq!(
        nodes,
        vec![b"node-1".to_vec(), b"node-2".to_vec(), b"node-3".to_vec()]
    );

    store
        .apply(vec![
            (vec![0x20, 2], None),
            (vec![0x20, 4], Some(b"node-4".to_vec())),
        ])
        .unwrap();
    assert!(!store.has(&[0x20, 2]).unwrap());
    assert_eq!(store.get(&[0x20, 4]).unwrap(), Some(b"node-4".to_vec()));

    {
        let mut cache = CacheStore::new(&mut *store);
        cache.set(&[0x30, 2], b"plan-2".to_vec()).unwrap();
        cache.delete(&[0x30, 1]).unwrap();
    }
    assert!(store.has(&[0x30, 1]).unwrap());
    assert!(!store.has(&[0x30, 2]).unwrap());

    {
        let mut cache = CacheStore::new(&mut *store);
        cache.set(&[0x30, 2], b"plan-2".to_vec()).unwrap();
        cache.delete(&[0x30, 1]).unwrap();
        cache.write().unwrap();
    }
    assert_eq!(store.scan_prefix(&[0x30]).unwrap().len(), 1);
    assert!(store.has(&[0x30, 2]).unwrap());
}

#[test]
fn memory_backend_semantics() {
    let mut store = MemoryStore::new();
    assert_backend_semantics(&mut store);
}

#[test]
fn sled_backend_semantics() {
    let dir = TempDir::new().expect("temp dir");
    let mut store = SledStore::open(dir.path()).expect("sled store");
    assert_backend_semantics(&mut store);
}

#[test]
fn sled_restart_keeps_committed_state() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().to_path_buf();

    {
        let mut store = SledStore::open(&path).expect("sled store");
        store.set_json(b"counter", &7u64).unwrap();
        store.set_u64(b"height", 12).unwrap();
        let mut cache = CacheStore::new(&mut store);
        cache.set(b"uncommitted", b"x".to_vec()).unwrap();
        drop(cache);
        store.flush().unwrap();
    }

    let store = SledStore::open(&path).expect("reopen");
    assert_eq!(store.get_json::<u64>(b"counter").unwrap(), Some(7));
    assert_eq!(store.get_u64(b"height").unwrap(), Some(12));
    assert!(!store.has(b"uncommitted").unwrap());
}
