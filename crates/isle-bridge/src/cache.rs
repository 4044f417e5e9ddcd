//! Identity-keyed proxy cache
//!
//! Maps (source object identity, destination universe) to the proxy built for
//! it, so repeated crossings of one object yield one proxy. Entries hold weak
//! references only; an entry is live while both its source object and its
//! proxy are still held somewhere.
//!
//! Each key owns a slot with its own mutex. The map shard lock is held only
//! long enough to find or reserve the slot; the slot lock then serializes
//! construction for that key alone.

use std::cell::RefCell;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use tracing::debug;

use isle_sdk::{identity, BridgeError, BridgeResult, Object, ObjectRef, UniverseId};

/// Cache key: source identity plus destination universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeKey {
    source: usize,
    universe: UniverseId,
}

impl BridgeKey {
    /// Key for bridging `source` into `universe`
    pub fn new(source: &ObjectRef, universe: UniverseId) -> Self {
        Self {
            source: identity(source),
            universe,
        }
    }
}

/// Weak association between a source object and its proxy
struct BridgeEntry {
    source: Weak<dyn Object>,
    proxy: Weak<dyn Object>,
}

impl BridgeEntry {
    fn is_live(&self) -> bool {
        self.source.strong_count() > 0 && self.proxy.strong_count() > 0
    }

    fn proxy(&self) -> Option<ObjectRef> {
        if self.source.strong_count() == 0 {
            return None;
        }
        self.proxy.upgrade()
    }
}

#[derive(Default)]
struct Slot {
    entry: Mutex<Option<BridgeEntry>>,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by a live entry
    pub hits: u64,
    /// Lookups that had to construct
    pub misses: u64,
    /// Proxies successfully constructed and published
    pub constructions: u64,
    /// Stale entries removed
    pub purged: u64,
}

thread_local! {
    static CONSTRUCTING: RefCell<Vec<BridgeKey>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as under construction on this thread
struct ConstructionGuard {
    key: BridgeKey,
}

impl ConstructionGuard {
    fn enter(key: BridgeKey) -> BridgeResult<Self> {
        CONSTRUCTING.with(|keys| {
            let mut keys = keys.borrow_mut();
            if keys.contains(&key) {
                return Err(BridgeError::Proxy(
                    "proxy factory re-entered the cache for the object it is building".to_string(),
                ));
            }
            keys.push(key);
            Ok(ConstructionGuard { key })
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|keys| {
            let mut keys = keys.borrow_mut();
            if let Some(pos) = keys.iter().rposition(|k| *k == self.key) {
                keys.remove(pos);
            }
        });
    }
}

/// Identity-keyed, weakly retaining proxy cache
pub struct ProxyCache {
    slots: DashMap<BridgeKey, Arc<Slot>, BuildHasherDefault<FxHasher>>,
    purge_interval: usize,
    since_purge: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    constructions: AtomicU64,
    purged: AtomicU64,
}

impl ProxyCache {
    /// Create a cache that purges stale entries every `purge_interval`
    /// constructions (0 disables opportunistic purging)
    pub fn new(purge_interval: usize) -> Self {
        Self {
            slots: DashMap::default(),
            purge_interval,
            since_purge: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            constructions: AtomicU64::new(0),
            purged: AtomicU64::new(0),
        }
    }

    /// Return the live proxy for `source` in `universe`, or build one with
    /// `factory` and publish it.
    ///
    /// Concurrent callers for the same key wait for the first construction
    /// and then share its result. A failed construction publishes nothing.
    pub fn get_or_create<F>(
        &self,
        source: &ObjectRef,
        universe: UniverseId,
        factory: F,
    ) -> BridgeResult<ObjectRef>
    where
        F: FnOnce() -> BridgeResult<ObjectRef>,
    {
        let key = BridgeKey::new(source, universe);
        let _guard = ConstructionGuard::enter(key)?;

        loop {
            let slot = self.slots.entry(key).or_default().value().clone();
            let mut entry = slot.entry.lock();

            // A purge may have dropped the slot between reservation and lock
            if !self.is_current(&key, &slot) {
                continue;
            }

            if let Some(proxy) = entry.as_ref().and_then(BridgeEntry::proxy) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(universe = universe.as_u64(), "proxy cache hit");
                return Ok(proxy);
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            let proxy = factory()?;
            *entry = Some(BridgeEntry {
                source: Arc::downgrade(source),
                proxy: Arc::downgrade(&proxy),
            });
            drop(entry);

            self.constructions.fetch_add(1, Ordering::Relaxed);
            debug!(
                universe = universe.as_u64(),
                proxy_type = proxy.type_descriptor().name(),
                "published proxy"
            );
            self.maybe_purge();
            return Ok(proxy);
        }
    }

    /// The live proxy for `source` in `universe`, without constructing
    pub fn get(&self, source: &ObjectRef, universe: UniverseId) -> Option<ObjectRef> {
        let key = BridgeKey::new(source, universe);
        let slot = self.slots.get(&key)?.value().clone();
        let entry = slot.entry.lock();
        entry.as_ref().and_then(BridgeEntry::proxy)
    }

    fn is_current(&self, key: &BridgeKey, slot: &Arc<Slot>) -> bool {
        self.slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }

    fn maybe_purge(&self) {
        if self.purge_interval == 0 {
            return;
        }
        let count = self.since_purge.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.purge_interval {
            self.since_purge.store(0, Ordering::Relaxed);
            self.purge();
        }
    }

    /// Remove entries whose source or proxy has been dropped.
    ///
    /// Slots currently locked by a construction are left alone. Returns the
    /// number of entries removed.
    pub fn purge(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| match slot.entry.try_lock() {
            Some(entry) => entry.as_ref().is_some_and(BridgeEntry::is_live),
            None => true,
        });
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            self.purged.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "purged stale proxy cache entries");
        }
        removed
    }

    /// Number of entries, live or stale
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for ProxyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCache")
            .field("entries", &self.slots.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_sdk::{CallResult, TypeDescriptor, TypeKind, Value};
    use std::sync::Barrier;
    use std::thread;

    struct Plain(Arc<TypeDescriptor>);

    impl Object for Plain {
        fn type_descriptor(&self) -> Arc<TypeDescriptor> {
            self.0.clone()
        }

        fn invoke(&self, _method: &str, _args: &[Value]) -> CallResult {
            Ok(Value::Null)
        }
    }

    fn plain() -> ObjectRef {
        Arc::new(Plain(
            TypeDescriptor::builder("x.Plain", TypeKind::Class).build(),
        ))
    }

    #[test]
    fn test_same_key_returns_same_proxy() {
        let cache = ProxyCache::new(0);
        let source = plain();
        let universe = UniverseId::new();

        let first = cache.get_or_create(&source, universe, || Ok(plain())).unwrap();
        let second = cache
            .get_or_create(&source, universe, || panic!("must not construct twice"))
            .unwrap();

        assert!(isle_sdk::same_object(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.constructions, 1);
    }

    #[test]
    fn test_distinct_universes_get_distinct_proxies() {
        let cache = ProxyCache::new(0);
        let source = plain();

        let a = cache.get_or_create(&source, UniverseId::new(), || Ok(plain())).unwrap();
        let b = cache.get_or_create(&source, UniverseId::new(), || Ok(plain())).unwrap();
        assert!(!isle_sdk::same_object(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_construction_publishes_nothing() {
        let cache = ProxyCache::new(0);
        let source = plain();
        let universe = UniverseId::new();

        let err = cache
            .get_or_create(&source, universe, || Err(BridgeError::Proxy("boom".into())))
            .err().unwrap();
        assert!(matches!(err, BridgeError::Proxy(_)));
        assert!(cache.get(&source, universe).is_none());

        assert!(cache.get_or_create(&source, universe, || Ok(plain())).is_ok());
    }

    #[test]
    fn test_dropped_proxy_is_rebuilt_and_purged() {
        let cache = ProxyCache::new(0);
        let source = plain();
        let universe = UniverseId::new();

        let proxy = cache.get_or_create(&source, universe, || Ok(plain())).unwrap();
        drop(proxy);
        assert!(cache.get(&source, universe).is_none());
        assert_eq!(cache.purge(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().purged, 1);
    }

    #[test]
    fn test_dropped_source_is_purged() {
        let cache = ProxyCache::new(0);
        let source = plain();
        let universe = UniverseId::new();

        let _proxy = cache.get_or_create(&source, universe, || Ok(plain())).unwrap();
        drop(source);
        assert_eq!(cache.purge(), 1);
    }

    #[test]
    fn test_reentrant_construction_is_an_error() {
        let cache = ProxyCache::new(0);
        let source = plain();
        let universe = UniverseId::new();

        let err = cache
            .get_or_create(&source, universe, || {
                cache.get_or_create(&source, universe, || Ok(plain()))
            })
            .err().unwrap();
        assert!(matches!(err, BridgeError::Proxy(_)));
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        let cache = Arc::new(ProxyCache::new(0));
        let source = plain();
        let universe = UniverseId::new();
        let built = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let source = source.clone();
                let built = built.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_create(&source, universe, || {
                            built.fetch_add(1, Ordering::SeqCst);
                            Ok(plain())
                        })
                        .unwrap()
                })
            })
            .collect();

        let proxies: Vec<ObjectRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(proxies
            .windows(2)
            .all(|w| isle_sdk::same_object(&w[0], &w[1])));
    }
}
