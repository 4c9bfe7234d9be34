//! Stale-while-revalidate for a single query.

use serde::Serialize;

use crate::cache::{CacheWrite, QueryOutput, RevalidationCache};
use crate::client::SwrClient;
use crate::evaluation::{Evaluation, ValueSource};
use crate::key::{QueryKey, QueryRef};
use crate::loading::Loadable;
use crate::provider::QueryProvider;
use crate::QueryError;

/// Combine one live subscription result with the cache.
///
/// - `Ready(v)`: return `v` and schedule `v` to be stored under `key`.
/// - `Loading`: return the cached value for `key` if there is one, otherwise
///   the sentinel.
///
/// A fresh live value always wins over anything cached.
pub fn evaluate<T: QueryOutput>(
    cache: &RevalidationCache,
    key: &QueryKey,
    live: Loadable<T>,
) -> Evaluation<Loadable<T>> {
    match live {
        Loadable::Ready(value) => Evaluation {
            commit: Some(CacheWrite::new(key.clone(), value.clone())),
            value: Loadable::Ready(value),
            source: ValueSource::Live,
        },
        Loadable::Loading => match cache.get::<T>(key) {
            Some(cached) => {
                cache.trace_stale(key);
                Evaluation {
                    value: Loadable::Ready(cached),
                    source: ValueSource::Cache,
                    commit: None,
                }
            }
            None => Evaluation {
                value: Loadable::Loading,
                source: ValueSource::Loading,
                commit: None,
            },
        },
    }
}

/// One consumer's view of a query whose arguments change over time.
///
/// [`SwrClient::query`] only substitutes a cached value recorded under the
/// same key. A `StableQuery` additionally remembers the last value it showed,
/// so switching arguments (page 1 to page 2, say) keeps the old result on
/// screen until the new one arrives instead of flashing a loading state.
///
/// With stale-while-revalidate disabled it is a plain pass-through.
///
/// # Example
///
/// ```
/// use query_swr::{Loadable, MemoryProvider, QueryRef, StableQuery, SwrClient};
///
/// const LIST_ITEMS: QueryRef<u32, Vec<u32>> = QueryRef::new("items:list");
///
/// let provider = MemoryProvider::new();
/// let client = SwrClient::new(provider.clone());
/// let mut list = StableQuery::new(LIST_ITEMS);
///
/// provider.resolve(&LIST_ITEMS, &1, vec![1, 2, 3])?;
/// assert_eq!(list.evaluate(&client, &1)?, Loadable::Ready(vec![1, 2, 3]));
/// assert_eq!(list.evaluate(&client, &2)?, Loadable::Ready(vec![1, 2, 3]));
///
/// provider.resolve(&LIST_ITEMS, &2, vec![4, 5, 6])?;
/// assert_eq!(list.evaluate(&client, &2)?, Loadable::Ready(vec![4, 5, 6]));
/// # Ok::<(), query_swr::QueryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StableQuery<A, T> {
    query: QueryRef<A, T>,
    last: Option<T>,
}

impl<A: Serialize, T: QueryOutput> StableQuery<A, T> {
    /// Track `query` with nothing shown yet.
    pub fn new(query: QueryRef<A, T>) -> Self {
        Self { query, last: None }
    }

    /// The tracked query.
    pub fn query(&self) -> &QueryRef<A, T> {
        &self.query
    }

    /// Last ready value this consumer rendered.
    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }

    /// Evaluate the query for `args` through `client`.
    pub fn evaluate<P: QueryProvider>(
        &mut self,
        client: &SwrClient<P>,
        args: &A,
    ) -> Result<Loadable<T>, QueryError> {
        let value = client.query(&self.query, args)?;
        if !client.config().enable_stale_while_revalidate {
            return Ok(value);
        }
        match value {
            Loadable::Ready(value) => {
                self.last = Some(value.clone());
                Ok(Loadable::Ready(value))
            }
            Loadable::Loading => {
                let key = self.query.key(args)?;
                Ok(match &self.last {
                    Some(last) => {
                        client.cache().trace_stale(&key);
                        Loadable::Ready(last.clone())
                    }
                    None => Loadable::Loading,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::SwrClientBuilder;
    use crate::key::{derive_key, FunctionReference};
    use crate::provider::MemoryProvider;

    const LIST_ITEMS: FunctionReference = FunctionReference::new("items:list");

    fn page(n: u32) -> QueryKey {
        derive_key(&LIST_ITEMS, &json!({ "page": n })).unwrap()
    }

    #[test]
    fn test_first_load_surfaces_sentinel() {
        let cache = RevalidationCache::new();
        let eval = evaluate::<Vec<u32>>(&cache, &page(1), Loadable::Loading);
        assert_eq!(eval.value, Loadable::Loading);
        assert_eq!(eval.source, ValueSource::Loading);
        assert!(eval.commit.is_none());
    }

    #[test]
    fn test_write_is_deferred_until_finish() {
        let cache = RevalidationCache::new();
        let eval = evaluate(&cache, &page(1), Loadable::Ready(vec![1, 2, 3]));
        assert_eq!(eval.source, ValueSource::Live);
        assert!(cache.is_empty());

        assert_eq!(eval.finish(&cache), Loadable::Ready(vec![1, 2, 3]));
        assert_eq!(cache.get::<Vec<i32>>(&page(1)), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_loading_serves_cached_value() {
        let cache = RevalidationCache::new();
        cache.set(&page(1), vec![1, 2, 3]);

        let eval = evaluate::<Vec<i32>>(&cache, &page(1), Loadable::Loading);
        assert!(eval.is_stale());
        assert!(eval.commit.is_none());
        assert_eq!(eval.value, Loadable::Ready(vec![1, 2, 3]));
    }

    #[test]
    fn test_live_value_beats_cache() {
        let cache = RevalidationCache::new();
        cache.set(&page(1), vec![1, 2, 3]);

        let value = evaluate(&cache, &page(1), Loadable::Ready(vec![9])).finish(&cache);
        assert_eq!(value, Loadable::Ready(vec![9]));
        assert_eq!(cache.get::<Vec<i32>>(&page(1)), Some(vec![9]));
    }

    #[test]
    fn test_other_keys_are_not_substituted() {
        let cache = RevalidationCache::new();
        cache.set(&page(1), vec![1, 2, 3]);

        let eval = evaluate::<Vec<i32>>(&cache, &page(2), Loadable::Loading);
        assert_eq!(eval.value, Loadable::Loading);
    }

    #[derive(Serialize)]
    struct Page {
        page: u32,
    }

    const PAGED: QueryRef<Page, Vec<u32>> = QueryRef::new("items:list");

    #[test]
    fn test_stable_query_keeps_previous_page() {
        let provider = MemoryProvider::new();
        let client = SwrClient::new(provider.clone());
        let mut list = StableQuery::new(PAGED);

        assert_eq!(list.evaluate(&client, &Page { page: 1 }).unwrap(), Loadable::Loading);

        provider.resolve(&PAGED, &Page { page: 1 }, vec![1, 2, 3]).unwrap();
        assert_eq!(
            list.evaluate(&client, &Page { page: 1 }).unwrap(),
            Loadable::Ready(vec![1, 2, 3])
        );
        assert_eq!(
            list.evaluate(&client, &Page { page: 2 }).unwrap(),
            Loadable::Ready(vec![1, 2, 3])
        );

        provider.resolve(&PAGED, &Page { page: 2 }, vec![4, 5, 6]).unwrap();
        assert_eq!(
            list.evaluate(&client, &Page { page: 2 }).unwrap(),
            Loadable::Ready(vec![4, 5, 6])
        );
        assert_eq!(list.last(), Some(&vec![4, 5, 6]));
    }

    #[test]
    fn test_stable_query_prefers_same_key_cache() {
        let provider = MemoryProvider::new();
        let client = SwrClient::new(provider.clone());
        let mut list = StableQuery::new(PAGED);

        provider.resolve(&PAGED, &Page { page: 1 }, vec![1]).unwrap();
        provider.resolve(&PAGED, &Page { page: 2 }, vec![2]).unwrap();
        list.evaluate(&client, &Page { page: 1 }).unwrap();
        list.evaluate(&client, &Page { page: 2 }).unwrap();

        provider.reset(&PAGED, &Page { page: 1 }).unwrap();
        assert_eq!(
            list.evaluate(&client, &Page { page: 1 }).unwrap(),
            Loadable::Ready(vec![1])
        );
    }

    #[test]
    fn test_stable_query_disabled_passes_through() {
        let provider = MemoryProvider::new();
        let client = SwrClientBuilder::new()
            .stale_while_revalidate(false)
            .build(provider.clone());
        let mut list = StableQuery::new(PAGED);

        provider.resolve(&PAGED, &Page { page: 1 }, vec![1, 2, 3]).unwrap();
        list.evaluate(&client, &Page { page: 1 }).unwrap();
        assert_eq!(list.evaluate(&client, &Page { page: 2 }).unwrap(), Loadable::Loading);
        assert!(list.last().is_none());
    }
}
