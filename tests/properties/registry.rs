//! Property tests for resolve-once registries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use deckhand::Registry;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: however lookups interleave, each registered key's factory
    /// runs exactly once if it was looked up and never otherwise, and
    /// unknown keys never run a factory.
    #[test]
    fn property_factories_run_at_most_once(
        registered in proptest::collection::btree_set("[a-e]", 0..5),
        lookups in proptest::collection::vec("[a-g]", 0..40),
    ) {
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        let mut counters: HashMap<String, Arc<AtomicUsize>> = HashMap::new();
        for key in &registered {
            let counter = Arc::new(AtomicUsize::new(0));
            counters.insert(key.clone(), Arc::clone(&counter));
            let value = Arc::new(key.to_uppercase());
            registry
                .register(key.clone(), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::clone(&value))
                })
                .unwrap();
        }

        let mut first_seen: HashMap<String, Arc<String>> = HashMap::new();
        for key in &lookups {
            match registry.resolve(key.as_str()) {
                Ok(instance) => {
                    prop_assert!(registered.contains(key));
                    let first = first_seen.entry(key.clone()).or_insert_with(|| Arc::clone(&instance));
                    prop_assert!(Arc::ptr_eq(first, &instance));
                }
                Err(err) => {
                    prop_assert!(!registered.contains(key));
                    prop_assert!(err.is_not_found());
                }
            }
        }

        for (key, counter) in &counters {
            let expected = usize::from(lookups.contains(key));
            prop_assert_eq!(counter.load(Ordering::SeqCst), expected);
        }
    }
}
