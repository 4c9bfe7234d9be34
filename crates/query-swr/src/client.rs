//! Consumer-facing entry points.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::batch::{self, BatchResults, QueryBatch};
use crate::cache::{QueryOutput, RevalidationCache};
use crate::config::SwrConfig;
use crate::key::QueryRef;
use crate::loading::Loadable;
use crate::paginated::{self, PaginatedResult, PaginationOptions};
use crate::provider::QueryProvider;
use crate::single;
use crate::QueryError;

/// Stale-while-revalidate front for a [`QueryProvider`].
///
/// Each entry point subscribes through the provider and, while the
/// subscription is loading, substitutes the last result seen for the same
/// key. The returned shapes are exactly those of the provider.
///
/// Debug logging is a property of the cache, not of the client. Clients
/// sharing a cache share the setting, and [`config`](Self::config) always
/// reports the cache's current state.
///
/// # Example
///
/// ```
/// use query_swr::{Loadable, MemoryProvider, QueryRef, SwrClient};
///
/// const LIST_ITEMS: QueryRef<u32, Vec<u32>> = QueryRef::new("items:list");
///
/// let provider = MemoryProvider::new();
/// let client = SwrClient::new(provider.clone());
///
/// provider.resolve(&LIST_ITEMS, &1, vec![1, 2, 3])?;
/// assert_eq!(client.query(&LIST_ITEMS, &1)?, Loadable::Ready(vec![1, 2, 3]));
///
/// // Page 2 never resolved, so nothing can stand in for it. Page 1 stays
/// // cached for when the consumer navigates back.
/// assert_eq!(client.query(&LIST_ITEMS, &2)?, Loadable::Loading);
/// provider.reset(&LIST_ITEMS, &1)?;
/// assert_eq!(client.query(&LIST_ITEMS, &1)?, Loadable::Ready(vec![1, 2, 3]));
/// # Ok::<(), query_swr::QueryError>(())
/// ```
pub struct SwrClient<P> {
    provider: P,
    cache: RevalidationCache,
    stale_while_revalidate: AtomicBool,
}

impl<P: QueryProvider> SwrClient<P> {
    /// Create a client with a fresh cache and the default configuration.
    pub fn new(provider: P) -> Self {
        SwrClientBuilder::new().build(provider)
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The shared cache.
    pub fn cache(&self) -> &RevalidationCache {
        &self.cache
    }

    /// Current configuration.
    pub fn config(&self) -> SwrConfig {
        SwrConfig {
            enable_stale_while_revalidate: self.stale_while_revalidate(),
            enable_debug_logging: self.cache.debug_logging(),
        }
    }

    /// Replace the configuration. Takes effect on the next evaluation.
    ///
    /// The debug logging flag is applied to the shared cache.
    pub fn set_config(&self, config: SwrConfig) {
        self.stale_while_revalidate
            .store(config.enable_stale_while_revalidate, Ordering::SeqCst);
        self.cache.set_debug_logging(config.enable_debug_logging);
    }

    fn stale_while_revalidate(&self) -> bool {
        self.stale_while_revalidate.load(Ordering::SeqCst)
    }

    /// Subscribe to `query` applied to `args`.
    ///
    /// Returns the live value when there is one, the cached value for the same
    /// key while loading, and `Loading` only when nothing was ever seen.
    pub fn query<A, T>(&self, query: &QueryRef<A, T>, args: &A) -> Result<Loadable<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        let live = self.provider.subscribe(query, args)?;
        if !self.stale_while_revalidate() {
            return Ok(live);
        }
        let key = query.key(args)?;
        Ok(single::evaluate(&self.cache, &key, live).finish(&self.cache))
    }

    /// Subscribe to every member of `batch`.
    ///
    /// While any member is loading, the last fully loaded result of the same
    /// batch is returned in its place.
    pub fn queries(&self, batch: &QueryBatch) -> Result<BatchResults, QueryError> {
        let live = self.provider.subscribe_many(batch)?;
        if !self.stale_while_revalidate() {
            return Ok(live);
        }
        let key = batch.key()?;
        Ok(batch::evaluate(&self.cache, &key, live).finish(&self.cache))
    }

    /// Subscribe to a paginated query.
    ///
    /// The returned `load_more` discards the cached pages for this key before
    /// requesting more.
    pub fn paginated_query<A, T>(
        &self,
        query: &QueryRef<A, T>,
        args: &A,
        options: PaginationOptions,
    ) -> Result<PaginatedResult<T>, QueryError>
    where
        A: Serialize,
        T: QueryOutput,
    {
        let live = self.provider.subscribe_paginated(query, args, options)?;
        if !self.stale_while_revalidate() {
            return Ok(live);
        }
        let key = query.key(args)?;
        Ok(paginated::evaluate(&self.cache, &key, live).finish(&self.cache))
    }
}

/// Builder for [`SwrClient`].
///
/// # Example
///
/// ```ignore
/// let cache = RevalidationCache::new();
/// let client = SwrClientBuilder::new()
///     .cache(cache.clone())
///     .debug_logging(true)
///     .build(provider);
/// ```
///
/// Debug logging is only touched when set through
/// [`debug_logging`](Self::debug_logging) or [`config`](Self::config);
/// otherwise the client inherits the state of the cache it is given.
#[derive(Debug)]
pub struct SwrClientBuilder {
    cache: Option<RevalidationCache>,
    stale_while_revalidate: bool,
    debug_logging: Option<bool>,
}

impl Default for SwrClientBuilder {
    fn default() -> Self {
        let config = SwrConfig::default();
        Self {
            cache: None,
            stale_while_revalidate: config.enable_stale_while_revalidate,
            debug_logging: None,
        }
    }
}

impl SwrClientBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share `cache` instead of creating a fresh one.
    pub fn cache(mut self, cache: RevalidationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SwrConfig) -> Self {
        self.stale_while_revalidate = config.enable_stale_while_revalidate;
        self.debug_logging = Some(config.enable_debug_logging);
        self
    }

    /// Turn stale-while-revalidate on or off.
    pub fn stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }

    /// Turn debug logging and global inspection on or off.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = Some(enabled);
        self
    }

    /// Build the client around `provider`.
    pub fn build<P: QueryProvider>(self, provider: P) -> SwrClient<P> {
        let cache = self.cache.unwrap_or_default();
        if let Some(enabled) = self.debug_logging {
            cache.set_debug_logging(enabled);
        }
        SwrClient {
            provider,
            cache,
            stale_while_revalidate: AtomicBool::new(self.stale_while_revalidate),
        }
    }
}
