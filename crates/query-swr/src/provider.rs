//! The live subscription seam.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::batch::{BatchResults, QueryBatch};
use crate::cache::{CacheValue, QueryOutput};
use crate::key::{derive_key, QueryKey, QueryRef};
use crate::loading::Loadable;
use crate::paginated::{LoadMore, PageSet, PaginatedResult, PaginationOptions, PaginationStatus};
use crate::QueryError;

/// Reactive query source wrapped by [`SwrClient`](crate::SwrClient).
///
/// Each method returns the current state of a subscription. The host
/// re-evaluates whenever the provider reports new data; the provider owns
/// fetching, retries and timeouts.
pub trait QueryProvider: Send + Sync {
    /// Current state of `query` applied to `args`.
    fn subscribe<A, T>(&self, query: &QueryRef<A, T>, args: &A) -> Result<Loadable<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput;

    /// Current state of every member of `batch`.
    fn subscribe_many(&self, batch: &QueryBatch) -> Result<BatchResults, QueryError>;

    /// Current state of a paginated query. `T` is the item type.
    fn subscribe_paginated<A, T>(
        &self,
        query: &QueryRef<A, T>,
        args: &A,
        options: PaginationOptions,
    ) -> Result<PaginatedResult<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput;
}

impl<P: QueryProvider> QueryProvider for Arc<P> {
    fn subscribe<A, T>(&self, query: &QueryRef<A, T>, args: &A) -> Result<Loadable<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        (**self).subscribe(query, args)
    }

    fn subscribe_many(&self, batch: &QueryBatch) -> Result<BatchResults, QueryError> {
        (**self).subscribe_many(batch)
    }

    fn subscribe_paginated<A, T>(
        &self,
        query: &QueryRef<A, T>,
        args: &A,
        options: PaginationOptions,
    ) -> Result<PaginatedResult<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        (**self).subscribe_paginated(query, args, options)
    }
}

#[derive(Clone)]
enum Slot {
    Ready(Arc<dyn CacheValue>),
    Failed(QueryError),
}

#[derive(Default)]
struct MemoryInner {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    load_more_requests: Mutex<Vec<(QueryKey, usize)>>,
    subscriptions: AtomicUsize,
}

impl MemoryInner {
    fn lookup<T: QueryOutput>(&self, key: &QueryKey) -> Result<Option<T>, QueryError> {
        match self.slots.lock().get(key) {
            None => Ok(None),
            Some(Slot::Failed(err)) => Err(err.clone()),
            Some(Slot::Ready(value)) => {
                let value: &dyn CacheValue = &**value;
                value.as_any().downcast_ref::<T>().cloned().map(Some).ok_or_else(|| {
                    QueryError::subscription(anyhow::anyhow!(
                        "{key} holds a {}, not a {}",
                        value.type_name(),
                        std::any::type_name::<T>()
                    ))
                })
            }
        }
    }

    fn store<T: QueryOutput>(&self, key: QueryKey, value: T) {
        self.slots.lock().insert(key, Slot::Ready(Arc::new(value)));
    }
}

/// Provider whose results are set by hand.
///
/// Every key starts out loading. [`resolve`](Self::resolve) delivers a value,
/// [`fail`](Self::fail) an error. Paginated queries are fed with
/// [`resolve_pages`](Self::resolve_pages); calling `load_more` on one of its
/// results records the request and moves a `CanLoadMore` page set to
/// `LoadingMore`.
///
/// Members of a [`QueryBatch`] are looked up as `serde_json::Value`, so resolve
/// them through a `QueryRef<_, Value>`.
///
/// This is cheap to clone - clones share state.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<MemoryInner>,
}

impl MemoryProvider {
    /// Create a provider with every query loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `value` for `query` applied to `args`.
    pub fn resolve<A, T>(&self, query: &QueryRef<A, T>, args: &A, value: T) -> Result<(), QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        self.inner.store(query.key(args)?, value);
        Ok(())
    }

    /// Put `query` applied to `args` back into the loading state.
    pub fn reset<A: Serialize, T>(&self, query: &QueryRef<A, T>, args: &A) -> Result<(), QueryError> {
        self.inner.slots.lock().remove(&query.key(args)?);
        Ok(())
    }

    /// Make subscriptions to `query` applied to `args` fail with `error`.
    pub fn fail<A: Serialize, T>(
        &self,
        query: &QueryRef<A, T>,
        args: &A,
        error: QueryError,
    ) -> Result<(), QueryError> {
        self.inner
            .slots
            .lock()
            .insert(query.key(args)?, Slot::Failed(error));
        Ok(())
    }

    /// Deliver loaded pages for a paginated query.
    pub fn resolve_pages<A, T>(
        &self,
        query: &QueryRef<A, T>,
        args: &A,
        results: Vec<T>,
        status: PaginationStatus,
    ) -> Result<(), QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        self.inner
            .store(query.key(args)?, PageSet { results, status });
        Ok(())
    }

    /// Every `load_more` call seen so far, with its key and count.
    pub fn load_more_requests(&self) -> Vec<(QueryKey, usize)> {
        self.inner.load_more_requests.lock().clone()
    }

    /// Number of subscribe calls of any kind.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.load(Ordering::SeqCst)
    }

    fn load_more_for<T: QueryOutput>(&self, key: QueryKey) -> LoadMore {
        let inner = self.inner.clone();
        LoadMore::new(move |count| {
            inner.load_more_requests.lock().push((key.clone(), count));
            if let Ok(Some(pages)) = inner.lookup::<PageSet<T>>(&key) {
                if pages.status == PaginationStatus::CanLoadMore {
                    inner.store(
                        key.clone(),
                        PageSet {
                            results: pages.results,
                            status: PaginationStatus::LoadingMore,
                        },
                    );
                }
            }
        })
    }
}

impl QueryProvider for MemoryProvider {
    fn subscribe<A, T>(&self, query: &QueryRef<A, T>, args: &A) -> Result<Loadable<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        self.inner.subscriptions.fetch_add(1, Ordering::SeqCst);
        let key = query.key(args)?;
        Ok(self.inner.lookup::<T>(&key)?.into())
    }

    fn subscribe_many(&self, batch: &QueryBatch) -> Result<BatchResults, QueryError> {
        self.inner.subscriptions.fetch_add(1, Ordering::SeqCst);
        let mut results = BatchResults::new();
        for (name, entry) in batch.iter() {
            let key = derive_key(&entry.function, &entry.args)?;
            results.insert(name, self.inner.lookup::<Value>(&key)?.into());
        }
        Ok(results)
    }

    fn subscribe_paginated<A, T>(
        &self,
        query: &QueryRef<A, T>,
        args: &A,
        _options: PaginationOptions,
    ) -> Result<PaginatedResult<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        self.inner.subscriptions.fetch_add(1, Ordering::SeqCst);
        let key = query.key(args)?;
        let load_more = self.load_more_for::<T>(key.clone());
        Ok(match self.inner.lookup::<PageSet<T>>(&key)? {
            Some(pages) => PaginatedResult::new(pages.results, pages.status, load_more),
            None => PaginatedResult::loading_first_page(load_more),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::key::FunctionReference;

    const USER: QueryRef<Value, Value> = QueryRef::new("users:get");
    const COUNT: QueryRef<(), u64> = QueryRef::new("stats:count");

    #[test]
    fn test_resolve_and_reset() {
        let provider = MemoryProvider::new();
        assert_eq!(provider.subscribe(&COUNT, &()).unwrap(), Loadable::Loading);

        provider.resolve(&COUNT, &(), 12).unwrap();
        assert_eq!(provider.subscribe(&COUNT, &()).unwrap(), Loadable::Ready(12));

        provider.reset(&COUNT, &()).unwrap();
        assert_eq!(provider.subscribe(&COUNT, &()).unwrap(), Loadable::Loading);
        assert_eq!(provider.subscription_count(), 3);
    }

    #[test]
    fn test_failure_is_reported() {
        let provider = MemoryProvider::new();
        provider
            .fail(&COUNT, &(), QueryError::subscription(anyhow::anyhow!("offline")))
            .unwrap();
        let err = provider.subscribe(&COUNT, &()).unwrap_err();
        assert_eq!(err.to_string(), "subscription failed: offline");
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let provider = MemoryProvider::new();
        provider.resolve(&COUNT, &(), 12).unwrap();
        let as_string: QueryRef<(), String> = QueryRef::from_function(COUNT.function().clone());
        assert!(provider.subscribe(&as_string, &()).is_err());
    }

    #[test]
    fn test_subscribe_many_reads_json_members() {
        let provider = MemoryProvider::new();
        provider
            .resolve(&USER, &json!({ "id": 1 }), json!({ "name": "ada" }))
            .unwrap();

        let batch = QueryBatch::new()
            .with("user", USER.function().clone(), &json!({ "id": 1 }))
            .unwrap()
            .with("other", FunctionReference::new("users:get"), &json!({ "id": 2 }))
            .unwrap();
        let results = provider.subscribe_many(&batch).unwrap();
        assert_eq!(results.get("user"), Some(&Loadable::Ready(json!({ "name": "ada" }))));
        assert_eq!(results.get("other"), Some(&Loadable::Loading));
    }

    #[test]
    fn test_load_more_moves_to_loading_more() {
        let provider = MemoryProvider::new();
        let query: QueryRef<(), u32> = QueryRef::new("items:paginate");
        let options = PaginationOptions::new(2);

        let first = provider.subscribe_paginated(&query, &(), options).unwrap();
        assert_eq!(first.status, PaginationStatus::LoadingFirstPage);

        provider
            .resolve_pages(&query, &(), vec![1, 2], PaginationStatus::CanLoadMore)
            .unwrap();
        let ready = provider.subscribe_paginated(&query, &(), options).unwrap();
        assert_eq!(ready.results, vec![1, 2]);

        ready.load_more(2);
        let more = provider.subscribe_paginated(&query, &(), options).unwrap();
        assert_eq!(more.status, PaginationStatus::LoadingMore);
        assert_eq!(more.results, vec![1, 2]);
        assert_eq!(
            provider.load_more_requests(),
            vec![(query.key(&()).unwrap(), 2)]
        );
    }
}
