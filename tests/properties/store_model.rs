//! Property tests comparing directory store backends against a plain map.

use std::collections::BTreeMap;

use proptest::prelude::*;

use deckhand::domain::ports::DirectoryStore;
use deckhand::infrastructure::{FileDirectory, MemoryDirectory};

#[derive(Debug, Clone)]
enum Op {
    Put {
        key: String,
        payload: Vec<u8>,
        stale: bool,
    },
    Delete {
        key: String,
        stale: bool,
    },
}

fn op() -> impl Strategy<Value = Op> {
    let key = "[a-c]";
    prop_oneof![
        3 => (key, proptest::collection::vec(any::<u8>(), 0..16), any::<bool>())
            .prop_map(|(key, payload, stale)| Op::Put { key, payload, stale }),
        1 => (key, any::<bool>()).prop_map(|(key, stale)| Op::Delete { key, stale }),
    ]
}

type Model = BTreeMap<String, (Vec<u8>, u64)>;

/// Apply `ops` to `store` and to a model, checking every outcome
fn apply(store: &dyn DirectoryStore, ops: &[Op]) -> Result<Model, TestCaseError> {
    let mut model = Model::new();
    // Last version of each deleted key
    let mut retired: BTreeMap<String, u64> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Put {
                key,
                payload,
                stale,
            } => {
                let current = model.get(key).map(|(_, v)| *v).unwrap_or(0);
                let expected = if *stale { current + 1 } else { current };
                let floor = match current {
                    0 => retired.get(key).copied().unwrap_or(0),
                    v => v,
                };
                match store.put("ns", key, payload, expected) {
                    Ok(version) => {
                        prop_assert!(!stale);
                        prop_assert_eq!(version, floor + 1);
                        model.insert(key.clone(), (payload.clone(), version));
                        retired.remove(key);
                    }
                    Err(err) => {
                        prop_assert!(*stale);
                        prop_assert!(err.is_conflict());
                    }
                }
            }
            Op::Delete { key, stale } => {
                let current = model.get(key).map(|(_, v)| *v);
                let expected = current.unwrap_or(1) + u64::from(*stale);
                match store.delete("ns", key, expected) {
                    Ok(()) => {
                        prop_assert!(current.is_some() && !stale);
                        model.remove(key);
                        retired.insert(key.clone(), expected);
                    }
                    Err(err) if current.is_none() => prop_assert!(err.is_not_found()),
                    Err(err) => {
                        prop_assert!(*stale);
                        prop_assert!(err.is_conflict());
                    }
                }
            }
        }
    }

    Ok(model)
}

/// The store holds exactly what the model holds
fn check_contents(store: &dyn DirectoryStore, model: &Model) -> Result<(), TestCaseError> {
    let keys: Vec<String> = model.keys().cloned().collect();
    prop_assert_eq!(store.list("ns").unwrap(), keys);
    for (key, (payload, version)) in model {
        let record = store.get("ns", key).unwrap();
        prop_assert_eq!(&record.payload, payload);
        prop_assert_eq!(record.version, *version);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the in-memory backend behaves like a versioned map whose
    /// versions never repeat for a key.
    #[test]
    fn property_memory_matches_model(ops in proptest::collection::vec(op(), 0..30)) {
        let store = MemoryDirectory::new();
        let model = apply(&store, &ops)?;
        check_contents(&store, &model)?;
    }

    /// PROPERTY: the file backend behaves like a versioned map, including
    /// after it is reopened.
    #[test]
    fn property_file_matches_model(ops in proptest::collection::vec(op(), 0..20)) {
        let dir = tempfile::tempdir().unwrap();
        let model = apply(&FileDirectory::open(dir.path()).unwrap(), &ops)?;

        let reopened = FileDirectory::open(dir.path()).unwrap();
        check_contents(&reopened, &model)?;
    }
}
