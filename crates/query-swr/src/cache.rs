//! The shared revalidation cache.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use papaya::{Compute, Operation};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use slab::Slab;

use crate::inspect;
use crate::key::QueryKey;
use crate::tracer::{NoopTracer, Tracer};

/// Monotonically increasing counter bumped on every effective cache change.
pub type RevisionCounter = u64;

/// Object-safe view of a cached value.
///
/// Automatically implemented for every `Debug + Send + Sync + 'static` type.
pub trait CacheValue: Any + Debug + Send + Sync {
    /// Get the value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Get the type name of the value.
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Debug + Send + Sync> CacheValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Convenience trait for values the wrappers can cache.
///
/// `PartialEq` lets the cache skip writes of an unchanged value, `Clone`
/// lets every reader get its own copy.
pub trait QueryOutput: Clone + PartialEq + Debug + Send + Sync + 'static {}
impl<T: Clone + PartialEq + Debug + Send + Sync + 'static> QueryOutput for T {}

fn erased(value: &Arc<dyn CacheValue>) -> &dyn Any {
    let value: &dyn CacheValue = &**value;
    value.as_any()
}

fn output_eq<T: PartialEq + 'static>(old: &dyn Any, new: &dyn Any) -> bool {
    match (old.downcast_ref::<T>(), new.downcast_ref::<T>()) {
        (Some(old), Some(new)) => old == new,
        _ => false,
    }
}

/// A cache write produced by an evaluation and applied after it.
///
/// Wrappers never mutate the cache while computing the value they return;
/// they hand back a `CacheWrite` that the caller commits afterwards.
#[derive(Clone)]
pub struct CacheWrite {
    key: QueryKey,
    value: Arc<dyn CacheValue>,
    same: fn(&dyn Any, &dyn Any) -> bool,
}

impl CacheWrite {
    /// Prepare a write of `value` under `key`.
    pub fn new<T: QueryOutput>(key: QueryKey, value: T) -> Self {
        Self {
            key,
            value: Arc::new(value),
            same: output_eq::<T>,
        }
    }

    /// The key this write targets.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Apply the write. Returns whether the stored value changed.
    pub fn apply(self, cache: &RevalidationCache) -> bool {
        cache.commit(self)
    }
}

impl Debug for CacheWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWrite")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

struct CacheEntry {
    value: Arc<dyn CacheValue>,
    changed_at: RevisionCounter,
}

type Listener = Arc<dyn Fn(&QueryKey) + Send + Sync>;

struct CacheInner {
    entries: papaya::HashMap<QueryKey, Arc<CacheEntry>, ahash::RandomState>,
    revision: AtomicU64,
    listeners: Mutex<HashMap<QueryKey, Slab<Listener>>>,
    tracer: RwLock<Arc<dyn Tracer>>,
    debug_logging: AtomicBool,
}

/// Process-wide map from [`QueryKey`] to the last known-good result.
///
/// This is cheap to clone - all data is behind `Arc` and every clone sees the
/// same entries. Create one at application start and hand it to every
/// [`SwrClient`](crate::SwrClient).
///
/// Entries have no TTL and no size bound. They are overwritten by later
/// results for the same key and removed only by [`delete`](Self::delete).
///
/// # Example
///
/// ```
/// use query_swr::{FunctionReference, RevalidationCache, derive_key};
///
/// let cache = RevalidationCache::new();
/// let key = derive_key(&FunctionReference::new("items:list"), &()).unwrap();
///
/// assert!(cache.set(&key, vec![1, 2, 3]));
/// assert_eq!(cache.get::<Vec<i32>>(&key), Some(vec![1, 2, 3]));
/// ```
#[derive(Clone)]
pub struct RevalidationCache {
    inner: Arc<CacheInner>,
}

impl Default for RevalidationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RevalidationCache {
    /// Create an empty cache with the [`NoopTracer`].
    pub fn new() -> Self {
        Self::with_tracer(NoopTracer)
    }

    /// Create an empty cache reporting to `tracer`.
    pub fn with_tracer<T: Tracer>(tracer: T) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: papaya::HashMap::with_hasher(ahash::RandomState::new()),
                revision: AtomicU64::new(0),
                listeners: Mutex::new(HashMap::new()),
                tracer: RwLock::new(Arc::new(tracer)),
                debug_logging: AtomicBool::new(false),
            }),
        }
    }

    /// Whether `self` and `other` are handles to the same cache.
    pub fn same_cache(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Replace the tracer.
    pub fn set_tracer<T: Tracer>(&self, tracer: T) {
        *self.inner.tracer.write() = Arc::new(tracer);
    }

    fn tracer(&self) -> Arc<dyn Tracer> {
        self.inner.tracer.read().clone()
    }

    /// Log every read, write and delete with its key and value at `DEBUG`,
    /// and make this cache the target of [`inspect::snapshot`].
    ///
    /// The flag belongs to the cache, so every client sharing it sees the
    /// same setting. Turning it off withdraws inspection only if this cache
    /// is the one installed.
    pub fn set_debug_logging(&self, enabled: bool) {
        let was = self.inner.debug_logging.swap(enabled, Ordering::SeqCst);
        if enabled {
            inspect::install(self);
            if !was {
                tracing::debug!(entries = self.len(), "swr cache inspection installed");
            }
        } else {
            inspect::uninstall(self);
        }
    }

    pub(crate) fn downgrade(&self) -> WeakCache {
        WeakCache(Arc::downgrade(&self.inner))
    }

    /// Whether debug logging is on.
    pub fn debug_logging(&self) -> bool {
        self.inner.debug_logging.load(Ordering::SeqCst)
    }

    /// Look up the value under `key`.
    ///
    /// A value stored under a different type reads as absent.
    pub fn get<T: QueryOutput>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.inner.entries.pin().get(key).cloned();
        let value = entry
            .as_ref()
            .and_then(|entry| erased(&entry.value).downcast_ref::<T>().cloned());

        self.tracer().on_cache_read(key, value.is_some());
        if self.debug_logging() {
            match &value {
                Some(value) => tracing::debug!(key = %key, value = ?value, "swr cache hit"),
                None => tracing::debug!(key = %key, "swr cache miss"),
            }
        }
        value
    }

    /// Store `value` under `key`, last write wins.
    ///
    /// Returns `false` without touching the entry when an equal value of the
    /// same type is already stored.
    pub fn set<T: QueryOutput>(&self, key: &QueryKey, value: T) -> bool {
        self.commit(CacheWrite::new(key.clone(), value))
    }

    fn commit(&self, write: CacheWrite) -> bool {
        let CacheWrite { key, value, same } = write;

        // The revision is allocated inside the compute so that the entry
        // holding the newest value also holds the newest `changed_at`.
        let pinned = self.inner.entries.pin();
        let result = pinned.compute(key.clone(), |entry| {
            if entry.is_some_and(|(_, entry)| same(erased(&entry.value), erased(&value))) {
                return Operation::Abort(());
            }
            let changed_at = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;
            Operation::Insert(Arc::new(CacheEntry {
                value: value.clone(),
                changed_at,
            }))
        });
        let unchanged = matches!(result, Compute::Aborted(()));
        drop(pinned);

        self.tracer().on_cache_write(&key, &*value, !unchanged);
        if self.debug_logging() {
            tracing::debug!(key = %key, value = ?value, changed = !unchanged, "swr cache write");
        }
        if !unchanged {
            self.notify(&key);
        }
        !unchanged
    }

    /// Remove the entry under `key`. Returns whether one existed.
    pub fn delete(&self, key: &QueryKey) -> bool {
        let existed = self.inner.entries.pin().remove(key).is_some();
        if existed {
            self.inner.revision.fetch_add(1, Ordering::SeqCst);
        }

        self.tracer().on_cache_delete(key, existed);
        if self.debug_logging() {
            tracing::debug!(key = %key, existed, "swr cache delete");
        }
        if existed {
            self.notify(key);
        }
        existed
    }

    pub(crate) fn trace_stale(&self, key: &QueryKey) {
        self.tracer().on_stale_served(key);
        if self.debug_logging() {
            tracing::debug!(key = %key, "swr serving stale value");
        }
    }

    /// Check whether an entry exists, without reporting a read.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.pin().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.pin().len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.inner.entries.pin().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Current revision. Starts at 0 and grows on every effective change.
    pub fn revision(&self) -> RevisionCounter {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Revision at which the entry under `key` was last written.
    pub fn changed_at(&self, key: &QueryKey) -> Option<RevisionCounter> {
        self.inner.entries.pin().get(key).map(|entry| entry.changed_at)
    }

    /// Register `listener` to run whenever the content under `key` changes.
    ///
    /// The listener runs after a write that stored a new value and after a
    /// delete that removed the entry. It is unregistered when the returned
    /// [`CacheWatch`] is dropped.
    pub fn watch<F>(&self, key: &QueryKey, listener: F) -> CacheWatch
    where
        F: Fn(&QueryKey) + Send + Sync + 'static,
    {
        let id = self
            .inner
            .listeners
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(Arc::new(listener));
        CacheWatch {
            cache: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
        }
    }

    fn notify(&self, key: &QueryKey) {
        // Listeners run outside the lock so they may read or watch the cache.
        let listeners: Vec<Listener> = match self.inner.listeners.lock().get(key) {
            Some(slab) => slab.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };
        for listener in listeners {
            listener(key);
        }
    }

    /// Snapshot of every entry, for inspection and debugging.
    pub fn snapshot(&self) -> CacheSnapshot {
        let pinned = self.inner.entries.pin();
        let entries = pinned
            .iter()
            .map(|(key, entry)| {
                let value: &dyn CacheValue = &*entry.value;
                (
                    key.clone(),
                    SnapshotEntry {
                        type_name: value.type_name(),
                        value: format!("{:?}", value),
                        changed_at: entry.changed_at,
                    },
                )
            })
            .collect();
        CacheSnapshot {
            revision: self.revision(),
            entries,
        }
    }
}

impl Debug for RevalidationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevalidationCache")
            .field("len", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}

/// Handle that does not keep the cache alive.
#[derive(Clone)]
pub(crate) struct WeakCache(Weak<CacheInner>);

impl WeakCache {
    pub(crate) fn upgrade(&self) -> Option<RevalidationCache> {
        self.0.upgrade().map(|inner| RevalidationCache { inner })
    }
}

/// Registration handle returned by [`RevalidationCache::watch`].
///
/// Dropping it unregisters the listener.
#[must_use = "the listener is unregistered when the watch is dropped"]
pub struct CacheWatch {
    cache: Weak<CacheInner>,
    key: QueryKey,
    id: usize,
}

impl CacheWatch {
    /// The watched key.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for CacheWatch {
    fn drop(&mut self) {
        let Some(inner) = self.cache.upgrade() else {
            return;
        };
        let mut listeners = inner.listeners.lock();
        if let Some(slab) = listeners.get_mut(&self.key) {
            if slab.contains(self.id) {
                slab.remove(self.id);
            }
            if slab.is_empty() {
                listeners.remove(&self.key);
            }
        }
    }
}

/// Point-in-time view of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    /// Cache revision when the snapshot was taken.
    pub revision: RevisionCounter,
    /// Entries keyed by query key.
    pub entries: BTreeMap<QueryKey, SnapshotEntry>,
}

/// One entry of a [`CacheSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    /// Rust type name of the stored value.
    pub type_name: &'static str,
    /// `Debug` rendering of the stored value.
    pub value: String,
    /// Revision of the last write.
    pub changed_at: RevisionCounter,
}
