//! Directory store contract, exercised against every backend.
//!
//! Run with: cargo test --test directory_store

use std::sync::Arc;

use deckhand::domain::entities::Record;
use deckhand::domain::ports::{DirectoryStore, StoreError};
use deckhand::infrastructure::{FileDirectory, MemoryDirectory};

fn assert_contract(store: &dyn DirectoryStore) {
    // Put then get returns the payload at version 1
    let v1 = store.put("runs", "web", b"first", Record::ABSENT).unwrap();
    assert_eq!(v1, 1);
    let record = store.get("runs", "web").unwrap();
    assert_eq!(record.payload, b"first");
    assert_eq!(record.version, 1);

    // Correct expected version advances to 2
    assert_eq!(store.put("runs", "web", b"second", 1).unwrap(), 2);

    // Stale expected version is rejected and changes nothing
    let err = store.put("runs", "web", b"stale", 1).unwrap_err();
    match err {
        StoreError::VersionConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected a version conflict, got {other}"),
    }
    let record = store.get("runs", "web").unwrap();
    assert_eq!(record.payload, b"second");
    assert_eq!(record.version, 2);

    // Creating an existing key conflicts
    assert!(store
        .put("runs", "web", b"again", Record::ABSENT)
        .unwrap_err()
        .is_conflict());

    // Namespaces are independent
    assert!(store.get("other", "web").unwrap_err().is_not_found());
    assert!(store.list("other").unwrap().is_empty());

    // Delete honours the expected version
    assert!(store.delete("runs", "web", 1).unwrap_err().is_conflict());
    store.delete("runs", "web", 2).unwrap();
    assert!(store.get("runs", "web").unwrap_err().is_not_found());
    assert!(store.delete("runs", "web", 2).unwrap_err().is_not_found());

    // A recreated key continues past its deleted version, so a writer
    // still holding a version from before the delete conflicts
    assert_eq!(store.put("runs", "web", b"recreated", Record::ABSENT).unwrap(), 3);
    for stale in [1, 2] {
        assert!(store
            .put("runs", "web", b"stale overwrite", stale)
            .unwrap_err()
            .is_conflict());
    }
    assert_eq!(store.get("runs", "web").unwrap().payload, b"recreated");

    // Listing is sorted
    for key in ["c", "a", "b"] {
        store.put("list", key, key.as_bytes(), Record::ABSENT).unwrap();
    }
    assert_eq!(store.list("list").unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn memory_backend_meets_contract() {
    assert_contract(&MemoryDirectory::new());
}

#[test]
fn file_backend_meets_contract() {
    let dir = tempfile::tempdir().unwrap();
    assert_contract(&FileDirectory::open(dir.path()).unwrap());
}

#[test]
fn successful_put_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileDirectory::open(dir.path()).unwrap();
        store.put("runs", "web", b"payload", Record::ABSENT).unwrap();
        store.put("runs", "web", b"payload v2", 1).unwrap();
    }

    let reopened = FileDirectory::open(dir.path()).unwrap();
    let record = reopened.get("runs", "web").unwrap();
    assert_eq!(record.payload, b"payload v2");
    assert_eq!(record.version, 2);
}

#[test]
fn two_handles_on_one_file_see_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileDirectory::open(dir.path()).unwrap();
    let second = FileDirectory::open(dir.path()).unwrap();

    first.put("runs", "web", b"from first", Record::ABSENT).unwrap();
    assert_eq!(second.get("runs", "web").unwrap().payload, b"from first");

    second.put("runs", "web", b"from second", 1).unwrap();
    assert!(first
        .put("runs", "web", b"lost update", 1)
        .unwrap_err()
        .is_conflict());
    assert_eq!(first.get("runs", "web").unwrap().payload, b"from second");
}

#[test]
fn racing_writers_never_lose_an_increment() {
    const WRITERS: usize = 8;
    const ROUNDS: usize = 10;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn DirectoryStore> = Arc::new(FileDirectory::open(dir.path()).unwrap());
    store.put("counter", "n", b"0", Record::ABSENT).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..WRITERS {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    loop {
                        let record = store.get("counter", "n").unwrap();
                        let n: usize = std::str::from_utf8(&record.payload)
                            .unwrap()
                            .parse()
                            .unwrap();
                        let next = (n + 1).to_string();
                        match store.put("counter", "n", next.as_bytes(), record.version) {
                            Ok(_) => break,
                            Err(err) if err.is_conflict() => continue,
                            Err(err) => panic!("unexpected store error: {err}"),
                        }
                    }
                }
            });
        }
    });

    let record = store.get("counter", "n").unwrap();
    assert_eq!(record.payload, (WRITERS * ROUNDS).to_string().as_bytes());
    assert_eq!(record.version, (WRITERS * ROUNDS + 1) as u64);
}
