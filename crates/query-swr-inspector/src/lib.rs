//! Query-SWR Inspector: tracing and observability for query-swr caches.
//!
//! Provides a [`Tracer`](query_swr::Tracer) implementation that turns cache
//! traffic into serialisable [`CacheEvent`]s and hands them to an
//! [`EventSink`]:
//!
//! - **EventCollector**: Collects events for testing and assertion
//! - **FilterSink** / **MultiplexSink**: Narrow the stream or fan it out to
//!   several sinks
//! - **TracingSink**: Bridges to the `tracing` crate (with `tracing` feature)
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use query_swr::{
//!     Loadable, MemoryProvider, QueryRef, RevalidationCache, SwrClientBuilder,
//! };
//! use query_swr_inspector::{EventCollector, EventSinkTracer};
//!
//! const COUNT: QueryRef<(), u64> = QueryRef::new("stats:count");
//!
//! let collector = Arc::new(EventCollector::new());
//! let cache = RevalidationCache::with_tracer(EventSinkTracer::new(collector.clone()));
//! let provider = MemoryProvider::new();
//! let client = SwrClientBuilder::new().cache(cache).build(provider.clone());
//!
//! provider.resolve(&COUNT, &(), 1)?;
//! client.query(&COUNT, &())?;
//! provider.reset(&COUNT, &())?;
//! assert_eq!(client.query(&COUNT, &())?, Loadable::Ready(1));
//!
//! assert_eq!(collector.trace().stale_served(), 1);
//! # Ok::<(), query_swr::QueryError>(())
//! ```

mod collector;
mod events;
mod sink;
mod tracer_impl;
#[cfg(feature = "tracing")]
mod tracing_sink;

pub use collector::EventCollector;
pub use events::{to_kinds, CacheEvent, CacheTrace, EventKind};
pub use sink::{EventSink, FilterSink, MultiplexSink};
pub use tracer_impl::EventSinkTracer;
#[cfg(feature = "tracing")]
pub use tracing_sink::TracingSink;
