//! Stale-while-revalidate for paginated queries.
//!
//! Only the first-page load is covered by a cached stand-in. While more pages
//! load, the live result (existing items plus `LoadingMore`) is shown as is,
//! and asking for more pages drops the cached page set for the key so that a
//! later first-page load never shows pages from before the boundary moved.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheWrite, QueryOutput, RevalidationCache};
use crate::evaluation::{Evaluation, ValueSource};
use crate::key::QueryKey;

/// Status of a paginated subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaginationStatus {
    /// Nothing loaded yet.
    LoadingFirstPage,
    /// Loaded pages are available and another page is on its way.
    LoadingMore,
    /// Loaded pages are available and more exist.
    CanLoadMore,
    /// Every page has been loaded.
    Exhausted,
}

impl PaginationStatus {
    /// Whether a page is in flight.
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            PaginationStatus::LoadingFirstPage | PaginationStatus::LoadingMore
        )
    }
}

/// Options for a paginated subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationOptions {
    /// Number of items requested for the first page.
    pub initial_num_items: usize,
}

impl PaginationOptions {
    /// Request `initial_num_items` items on the first page.
    pub fn new(initial_num_items: usize) -> Self {
        Self { initial_num_items }
    }
}

/// Callback requesting `count` more items from a paginated subscription.
///
/// Two handles are equal iff they wrap the same callback.
#[derive(Clone)]
pub struct LoadMore(Arc<dyn Fn(usize) + Send + Sync>);

impl LoadMore {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A callback that does nothing.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Request `count` more items.
    pub fn call(&self, count: usize) {
        (self.0)(count)
    }
}

impl fmt::Debug for LoadMore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoadMore(..)")
    }
}

impl PartialEq for LoadMore {
    fn eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }
}

impl Eq for LoadMore {}

/// Loaded items of a paginated subscription, without the callback.
///
/// This is what the cache stores for a paginated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSet<T> {
    /// Items of every loaded page, in order.
    pub results: Vec<T>,
    /// Status when the items were observed.
    pub status: PaginationStatus,
}

/// Live state of a paginated subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedResult<T> {
    /// Items of every loaded page, in order.
    pub results: Vec<T>,
    /// Current status.
    pub status: PaginationStatus,
    load_more: LoadMore,
}

impl<T> PaginatedResult<T> {
    /// Create a result with the given items, status and callback.
    pub fn new(results: Vec<T>, status: PaginationStatus, load_more: LoadMore) -> Self {
        Self {
            results,
            status,
            load_more,
        }
    }

    /// Empty result in `LoadingFirstPage`.
    pub fn loading_first_page(load_more: LoadMore) -> Self {
        Self::new(Vec::new(), PaginationStatus::LoadingFirstPage, load_more)
    }

    /// Whether a page is in flight.
    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    /// Whether every page has been loaded.
    pub fn is_exhausted(&self) -> bool {
        self.status == PaginationStatus::Exhausted
    }

    /// Request `count` more items.
    pub fn load_more(&self, count: usize) {
        self.load_more.call(count)
    }

    /// The callback behind [`load_more`](Self::load_more).
    pub fn load_more_handle(&self) -> &LoadMore {
        &self.load_more
    }

    /// Items and status without the callback.
    pub fn page_set(&self) -> PageSet<T>
    where
        T: Clone,
    {
        PageSet {
            results: self.results.clone(),
            status: self.status,
        }
    }
}

/// Wrap `inner` so that it drops the cache entry for `key` before asking
/// for more items.
pub fn invalidating_load_more(cache: RevalidationCache, key: QueryKey, inner: LoadMore) -> LoadMore {
    LoadMore::new(move |count| {
        cache.delete(&key);
        inner.call(count);
    })
}

/// Combine a live paginated result with the cache.
///
/// - `CanLoadMore` / `Exhausted`: return live and schedule its page set to be
///   stored under `key`.
/// - `LoadingFirstPage`: return the cached page set if there is one,
///   otherwise the live (empty) result.
/// - `LoadingMore`: return live untouched.
///
/// In every case the returned `load_more` is the live one wrapped by
/// [`invalidating_load_more`].
pub fn evaluate<T: QueryOutput>(
    cache: &RevalidationCache,
    key: &QueryKey,
    live: PaginatedResult<T>,
) -> Evaluation<PaginatedResult<T>> {
    let load_more = invalidating_load_more(cache.clone(), key.clone(), live.load_more.clone());

    match live.status {
        PaginationStatus::CanLoadMore | PaginationStatus::Exhausted => Evaluation {
            commit: Some(CacheWrite::new(key.clone(), live.page_set())),
            value: PaginatedResult { load_more, ..live },
            source: ValueSource::Live,
        },
        PaginationStatus::LoadingMore => Evaluation {
            value: PaginatedResult { load_more, ..live },
            source: ValueSource::Live,
            commit: None,
        },
        PaginationStatus::LoadingFirstPage => match cache.get::<PageSet<T>>(key) {
            Some(cached) => {
                cache.trace_stale(key);
                Evaluation {
                    value: PaginatedResult::new(cached.results, cached.status, load_more),
                    source: ValueSource::Cache,
                    commit: None,
                }
            }
            None => Evaluation {
                value: PaginatedResult { load_more, ..live },
                source: ValueSource::Loading,
                commit: None,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::key::{derive_key, FunctionReference};

    fn key() -> QueryKey {
        derive_key(&FunctionReference::new("items:paginate"), &json!({ "channel": "general" }))
            .unwrap()
    }

    fn counting_load_more() -> (LoadMore, Arc<AtomicUsize>) {
        let requested = Arc::new(AtomicUsize::new(0));
        let counter = requested.clone();
        let load_more = LoadMore::new(move |n| {
            counter.fetch_add(n, Ordering::SeqCst);
        });
        (load_more, requested)
    }

    #[test]
    fn test_ready_pages_are_cached() {
        let cache = RevalidationCache::new();
        let live = PaginatedResult::new(vec![1, 2], PaginationStatus::CanLoadMore, LoadMore::noop());

        let value = evaluate(&cache, &key(), live).finish(&cache);
        assert_eq!(value.results, vec![1, 2]);
        assert_eq!(
            cache.get::<PageSet<i32>>(&key()),
            Some(PageSet {
                results: vec![1, 2],
                status: PaginationStatus::CanLoadMore
            })
        );
    }

    #[test]
    fn test_first_page_load_serves_cached_pages() {
        let cache = RevalidationCache::new();
        cache.set(
            &key(),
            PageSet {
                results: vec![1, 2, 3],
                status: PaginationStatus::Exhausted,
            },
        );

        let eval = evaluate(&cache, &key(), PaginatedResult::<i32>::loading_first_page(LoadMore::noop()));
        assert!(eval.is_stale());
        assert_eq!(eval.value.results, vec![1, 2, 3]);
        assert_eq!(eval.value.status, PaginationStatus::Exhausted);
    }

    #[test]
    fn test_loading_more_is_passed_through() {
        let cache = RevalidationCache::new();
        cache.set(
            &key(),
            PageSet {
                results: vec![9, 9, 9, 9],
                status: PaginationStatus::CanLoadMore,
            },
        );

        let live = PaginatedResult::new(vec![1, 2], PaginationStatus::LoadingMore, LoadMore::noop());
        let eval = evaluate(&cache, &key(), live);
        assert_eq!(eval.source, ValueSource::Live);
        assert!(eval.commit.is_none());
        assert_eq!(eval.value.results, vec![1, 2]);
        assert_eq!(eval.value.status, PaginationStatus::LoadingMore);
    }

    #[test]
    fn test_load_more_deletes_then_delegates() {
        let cache = RevalidationCache::new();
        let (inner, requested) = counting_load_more();

        // The inner callback observes the entry already gone.
        let observer = cache.clone();
        let seen_entry = Arc::new(AtomicUsize::new(0));
        let seen = seen_entry.clone();
        let checked = LoadMore::new(move |n| {
            if observer.contains(&key()) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            inner.call(n);
        });

        let live = PaginatedResult::new(vec![1, 2], PaginationStatus::CanLoadMore, checked);
        let value = evaluate(&cache, &key(), live).finish(&cache);
        assert!(cache.contains(&key()));

        value.load_more(10);
        assert_eq!(requested.load(Ordering::SeqCst), 10);
        assert_eq!(seen_entry.load(Ordering::SeqCst), 0);
        assert!(!cache.contains(&key()));

        let remount = evaluate(&cache, &key(), PaginatedResult::<i32>::loading_first_page(LoadMore::noop()));
        assert_eq!(remount.source, ValueSource::Loading);
        assert_eq!(remount.value.status, PaginationStatus::LoadingFirstPage);
        assert!(remount.value.results.is_empty());
    }

    #[test]
    fn test_load_more_handle_is_replaced() {
        let cache = RevalidationCache::new();
        let live_handle = LoadMore::noop();
        let live = PaginatedResult::new(vec![1], PaginationStatus::Exhausted, live_handle.clone());
        let value = evaluate(&cache, &key(), live).finish(&cache);
        assert_ne!(value.load_more_handle(), &live_handle);
        assert_eq!(live_handle, live_handle.clone());
    }
}
