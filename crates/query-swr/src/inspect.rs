//! Process-global access to a cache for debugging.
//!
//! A client with debug logging enabled installs its cache here, so a debugger
//! hook, admin endpoint or REPL can dump the cache without holding a handle.

use parking_lot::RwLock;

use crate::cache::{CacheSnapshot, RevalidationCache, WeakCache};

// Weak, so an installed cache still goes away with its last handle.
static INSPECTED: RwLock<Option<WeakCache>> = parking_lot::const_rwlock(None);

/// Make `cache` the globally inspectable cache, replacing any previous one.
pub fn install(cache: &RevalidationCache) {
    *INSPECTED.write() = Some(cache.downgrade());
}

/// Remove `cache` if it is the installed one.
pub fn uninstall(cache: &RevalidationCache) {
    let mut inspected = INSPECTED.write();
    let stale = match inspected.as_ref().map(WeakCache::upgrade) {
        Some(Some(installed)) => installed.same_cache(cache),
        Some(None) => true,
        None => false,
    };
    if stale {
        *inspected = None;
    }
}

/// The installed cache, if it is still alive.
pub fn installed() -> Option<RevalidationCache> {
    INSPECTED.read().as_ref().and_then(WeakCache::upgrade)
}

/// Whether a live cache is installed.
pub fn is_installed() -> bool {
    installed().is_some()
}

/// Snapshot of the installed cache.
pub fn snapshot() -> Option<CacheSnapshot> {
    installed().map(|cache| cache.snapshot())
}
