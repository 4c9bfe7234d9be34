//! Tracer trait for observing cache traffic.
//!
//! The [`RevalidationCache`](crate::RevalidationCache) reports every read,
//! write, delete and stale substitution to its tracer. The default
//! [`NoopTracer`] discards everything; the `query-swr-inspector` crate provides
//! a tracer that turns the callbacks into serialisable events.
//!
//! # Example
//!
//! ```ignore
//! use query_swr::{QueryKey, RevalidationCache, Tracer};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn on_cache_read(&self, key: &QueryKey, hit: bool) {
//!         println!("read {key}: hit={hit}");
//!     }
//! }
//!
//! let cache = RevalidationCache::with_tracer(PrintTracer);
//! ```

use crate::cache::CacheValue;
use crate::key::QueryKey;

/// Observer of cache operations.
///
/// All methods have default empty implementations, so only the events of
/// interest need overriding.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: a cache may be shared between
/// threads and the tracer is called from whichever thread touches it.
pub trait Tracer: Send + Sync + 'static {
    /// Called on every cache lookup.
    #[inline]
    fn on_cache_read(&self, _key: &QueryKey, _hit: bool) {}

    /// Called on every write. `changed` is false when the value equalled the
    /// stored one and the write was skipped.
    #[inline]
    fn on_cache_write(&self, _key: &QueryKey, _value: &dyn CacheValue, _changed: bool) {}

    /// Called on every delete. `existed` is false when the key was absent.
    #[inline]
    fn on_cache_delete(&self, _key: &QueryKey, _existed: bool) {}

    /// Called when a wrapper hands out a cached value in place of the
    /// loading sentinel.
    #[inline]
    fn on_stale_served(&self, _key: &QueryKey) {}
}

/// Tracer that discards all events.
///
/// This is the default tracer for [`RevalidationCache`](crate::RevalidationCache).
pub struct NoopTracer;

impl Tracer for NoopTracer {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::cache::RevalidationCache;
    use crate::key::{derive_key, FunctionReference};

    #[derive(Default)]
    struct CountingTracer {
        reads: AtomicUsize,
        hits: AtomicUsize,
        changed_writes: AtomicUsize,
        deletes: AtomicUsize,
    }

    impl Tracer for CountingTracer {
        fn on_cache_read(&self, _key: &QueryKey, hit: bool) {
            self.reads.fetch_add(1, Ordering::Relaxed);
            if hit {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
        }

        fn on_cache_write(&self, _key: &QueryKey, _value: &dyn CacheValue, changed: bool) {
            if changed {
                self.changed_writes.fetch_add(1, Ordering::Relaxed);
            }
        }

        fn on_cache_delete(&self, _key: &QueryKey, existed: bool) {
            if existed {
                self.deletes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    struct Shared(Arc<CountingTracer>);

    impl Tracer for Shared {
        fn on_cache_read(&self, key: &QueryKey, hit: bool) {
            self.0.on_cache_read(key, hit);
        }

        fn on_cache_write(&self, key: &QueryKey, value: &dyn CacheValue, changed: bool) {
            self.0.on_cache_write(key, value, changed);
        }

        fn on_cache_delete(&self, key: &QueryKey, existed: bool) {
            self.0.on_cache_delete(key, existed);
        }
    }

    #[test]
    fn test_cache_reports_to_tracer() {
        let tracer = Arc::new(CountingTracer::default());
        let cache = RevalidationCache::with_tracer(Shared(tracer.clone()));
        let key = derive_key(&FunctionReference::new("items:list"), &()).unwrap();

        assert_eq!(cache.get::<u32>(&key), None);
        cache.set(&key, 1u32);
        cache.set(&key, 1u32);
        assert_eq!(cache.get::<u32>(&key), Some(1));
        cache.delete(&key);
        cache.delete(&key);

        assert_eq!(tracer.reads.load(Ordering::Relaxed), 2);
        assert_eq!(tracer.hits.load(Ordering::Relaxed), 1);
        assert_eq!(tracer.changed_writes.load(Ordering::Relaxed), 1);
        assert_eq!(tracer.deletes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_set_tracer_replaces_previous() {
        let first = Arc::new(CountingTracer::default());
        let second = Arc::new(CountingTracer::default());
        let cache = RevalidationCache::with_tracer(Shared(first.clone()));
        let key = derive_key(&FunctionReference::new("items:list"), &()).unwrap();

        cache.get::<u32>(&key);
        cache.set_tracer(Shared(second.clone()));
        cache.get::<u32>(&key);

        assert_eq!(first.reads.load(Ordering::Relaxed), 1);
        assert_eq!(second.reads.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_tracer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopTracer>();
        assert_send_sync::<Arc<dyn Tracer>>();
    }
}
