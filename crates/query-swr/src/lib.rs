//! Query-SWR: stale-while-revalidate caching for reactive query subscriptions.
//!
//! Wraps a [`QueryProvider`] so that a query which is loading again (because
//! its arguments changed, the subscription restarted, or the consumer was
//! remounted) keeps showing the last result seen for the same key until the
//! fresh one arrives.
//!
//! # Key Features
//!
//! - **Deterministic keys**: Query identity plus canonical JSON arguments, so
//!   structurally equal arguments always share a cache slot
//! - **Three shapes**: Single queries, named batches and paginated lists
//! - **Deferred writes**: Wrappers only read; cache writes travel as
//!   [`CacheWrite`] and land when the host finishes the [`Evaluation`]
//! - **Early cutoff**: Storing an equal value does not bump the revision or
//!   wake watchers
//! - **Pass-through mode**: With stale-while-revalidate disabled, every entry
//!   point returns the provider's result untouched
//! - **Inspection**: The [`Tracer`] API and the [`inspect`] module expose cache
//!   activity for debugging
//!
//! # Example
//!
//! ```
//! use query_swr::{Loadable, MemoryProvider, QueryRef, SwrClient};
//!
//! const COUNT: QueryRef<(), u64> = QueryRef::new("stats:count");
//!
//! let provider = MemoryProvider::new();
//! let client = SwrClient::new(provider.clone());
//! assert_eq!(client.query(&COUNT, &())?, Loadable::Loading);
//!
//! provider.resolve(&COUNT, &(), 42)?;
//! assert_eq!(client.query(&COUNT, &())?, Loadable::Ready(42));
//!
//! // The subscription restarts; the last value stands in.
//! provider.reset(&COUNT, &())?;
//! assert_eq!(client.query(&COUNT, &())?, Loadable::Ready(42));
//! # Ok::<(), query_swr::QueryError>(())
//! ```

mod cache;
mod client;
mod config;
mod error;
mod evaluation;
mod key;
mod loading;
mod provider;

pub mod batch;
pub mod inspect;
pub mod paginated;
pub mod single;
pub mod tracer;

pub use batch::{BatchEntry, BatchResults, QueryBatch};
pub use cache::{
    CacheSnapshot, CacheValue, CacheWatch, CacheWrite, QueryOutput, RevalidationCache,
    RevisionCounter, SnapshotEntry,
};
pub use client::{SwrClient, SwrClientBuilder};
pub use config::SwrConfig;
pub use error::QueryError;
pub use evaluation::{Evaluation, ValueSource};
pub use key::{canonical_args, derive_batch_key, derive_key, FunctionReference, QueryKey, QueryRef};
pub use loading::Loadable;
pub use paginated::{LoadMore, PageSet, PaginatedResult, PaginationOptions, PaginationStatus};
pub use provider::{MemoryProvider, QueryProvider};
pub use single::StableQuery;
pub use tracer::{NoopTracer, Tracer};
