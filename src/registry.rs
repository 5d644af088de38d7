//! Plugin registry
//!
//! Maps a key to a deferred constructor. Nothing is constructed at
//! registration time; the first `resolve` of a key runs its factory and
//! every later `resolve` of that key gets the same outcome back, whether it
//! was an instance or an error.
//!
//! Concurrency: the slot map sits behind one mutex that is only held for
//! lookups. Construction happens outside it on a per-key `OnceLock`, so
//! concurrent callers of the same key wait for the single in-flight factory
//! while other keys resolve in parallel.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::ports::{App, Infrastructure};
use crate::domain::value_objects::AppTuple;

/// Deferred plugin constructor
pub type Factory<T> = Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>;

/// Construction failure shared by every caller waiting on the same key
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Registry of application plugins keyed by app tuple
pub type AppRegistry = Registry<AppTuple, Arc<dyn App>>;

/// Registry of infrastructure plugins keyed by infrastructure type
pub type InfraRegistry = Registry<String, Arc<dyn Infrastructure>>;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("no {kind} registered for {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key} has already been resolved and cannot be re-registered")]
    AlreadyResolved { kind: &'static str, key: String },

    #[error("failed to construct {kind} {key}: {source}")]
    Construction {
        kind: &'static str,
        key: String,
        #[source]
        source: SharedError,
    },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

type Outcome<T> = Result<T, RegistryError>;

struct Slot<T> {
    factory: Factory<T>,
    outcome: Arc<OnceLock<Outcome<T>>>,
    /// Set as soon as a resolution starts, even before the factory returns
    resolved: bool,
}

/// Key to factory mapping with resolve-once memoization
pub struct Registry<K, T> {
    kind: &'static str,
    slots: Mutex<HashMap<K, Slot<T>>>,
}

impl<K, T> Registry<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Clone,
{
    /// `kind` names the plugin family in errors and logs
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the factory for `key`.
    ///
    /// Fails with `AlreadyResolved` once `key` has been resolved; the
    /// cached outcome would otherwise silently diverge from the registry.
    pub fn register<F>(&self, key: K, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let mut slots = self.slots();
        if slots.get(&key).is_some_and(|slot| slot.resolved) {
            return Err(RegistryError::AlreadyResolved {
                kind: self.kind,
                key: key.to_string(),
            });
        }

        debug!(kind = self.kind, key = %key, "Registered factory");
        slots.insert(
            key,
            Slot {
                factory: Arc::new(factory),
                outcome: Arc::new(OnceLock::new()),
                resolved: false,
            },
        );
        Ok(())
    }

    /// Register a factory that hands out clones of an existing instance
    pub fn register_instance(&self, key: K, instance: T) -> Result<(), RegistryError>
    where
        T: Send + Sync + 'static,
    {
        self.register(key, move || Ok(instance.clone()))
    }

    /// Builder form of `register`
    pub fn with<F>(self, key: K, factory: F) -> Result<Self, RegistryError>
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(key, factory)?;
        Ok(self)
    }

    /// Look up `key`, constructing it on first use.
    ///
    /// The factory runs at most once per key. Callers that arrive while it
    /// is running block until it finishes and receive the same outcome.
    pub fn resolve<Q>(&self, key: &Q) -> Result<T, RegistryError>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + fmt::Display + ?Sized,
    {
        let (factory, outcome) = {
            let mut slots = self.slots();
            let slot = slots.get_mut(key).ok_or_else(|| RegistryError::NotFound {
                kind: self.kind,
                key: key.to_string(),
            })?;
            slot.resolved = true;
            (Arc::clone(&slot.factory), Arc::clone(&slot.outcome))
        };

        outcome
            .get_or_init(|| {
                debug!(kind = self.kind, key = %key, "Constructing plugin");
                factory().map_err(|err| {
                    warn!(kind = self.kind, key = %key, error = %err, "Plugin construction failed");
                    let boxed: Box<dyn StdError + Send + Sync> = err.into();
                    RegistryError::Construction {
                        kind: self.kind,
                        key: key.to_string(),
                        source: Arc::from(boxed),
                    }
                })
            })
            .clone()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.slots().contains_key(key)
    }

    /// Whether a resolution of `key` has started
    pub fn is_resolved<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.slots().get(key).is_some_and(|slot| slot.resolved)
    }

    pub fn keys(&self) -> Vec<K> {
        self.slots().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

impl<K, T> fmt::Debug for Registry<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys().iter().map(|k| k.to_string()).collect();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("keys", &keys)
            .finish()
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Registry::new("application")
    }
}

impl Default for InfraRegistry {
    fn default() -> Self {
        Registry::new("infrastructure")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn counting(
        counter: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl Fn() -> anyhow::Result<Arc<String>> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(value.to_string()))
        }
    }

    #[test]
    fn resolve_constructs_once_and_returns_same_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        registry.register("a".into(), counting(&calls, "alpha")).unwrap();

        let first = registry.resolve("a").unwrap();
        let second = registry.resolve("a").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registration_does_not_construct() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        registry.register("a".into(), counting(&calls, "alpha")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!registry.is_resolved("a"));
    }

    #[test]
    fn unknown_key_is_not_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        registry.register("a".into(), counting(&calls, "alpha")).unwrap();

        let err = registry.resolve("b").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no widget registered for b");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn overwrite_before_resolution_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        registry.register("a".into(), counting(&first, "one")).unwrap();
        registry.register("a".into(), counting(&second, "two")).unwrap();

        assert_eq!(*registry.resolve("a").unwrap(), "two");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn re_register_after_resolution_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        registry.register("a".into(), counting(&calls, "one")).unwrap();
        let before = registry.resolve("a").unwrap();

        let err = registry
            .register("a".into(), counting(&calls, "two"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyResolved { .. }));

        let after = registry.resolve("a").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn construction_error_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        let counter = Arc::clone(&calls);
        registry
            .register("bad".into(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("credentials missing")
            })
            .unwrap();

        for _ in 0..3 {
            let err = registry.resolve("bad").unwrap_err();
            match err {
                RegistryError::Construction { key, source, .. } => {
                    assert_eq!(key, "bad");
                    assert_eq!(source.to_string(), "credentials missing");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_resolution_constructs_once() {
        const WORKERS: usize = 16;
        let calls = Arc::new(AtomicUsize::new(0));
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        let counter = Arc::clone(&calls);
        registry
            .register("slow".into(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(Arc::new("slow".to_string()))
            })
            .unwrap();

        let barrier = Barrier::new(WORKERS);
        let results: Vec<Arc<String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registry.resolve("slow").unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn debug_lists_keys() {
        let registry: Registry<String, Arc<String>> = Registry::new("widget");
        registry
            .register_instance("a".into(), Arc::new("x".into()))
            .unwrap();
        let rendered = format!("{:?}", registry);
        assert!(rendered.contains("widget"));
        assert!(rendered.contains("\"a\""));
    }
}
