//! EventSinkTracer - bridge between the query-swr `Tracer` and `EventSink`.

use query_swr::{CacheValue, QueryKey, Tracer};

use crate::events::CacheEvent;
use crate::sink::EventSink;

/// A [`Tracer`] that turns cache callbacks into [`CacheEvent`]s for a sink.
///
/// Pass an `Arc` of the sink to keep a handle for reading it back.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use query_swr::{MemoryProvider, QueryRef, RevalidationCache, SwrClientBuilder};
/// use query_swr_inspector::{EventCollector, EventSinkTracer, FilterSink, MultiplexSink};
///
/// const COUNT: QueryRef<(), u64> = QueryRef::new("stats:count");
///
/// let everything = Arc::new(EventCollector::new());
/// let stale = Arc::new(EventCollector::new());
/// let sink = MultiplexSink::default()
///     .with(everything.clone())
///     .with(FilterSink::stale_only(stale.clone()));
///
/// let cache = RevalidationCache::with_tracer(EventSinkTracer::new(sink));
/// let provider = MemoryProvider::new();
/// let client = SwrClientBuilder::new().cache(cache).build(provider.clone());
///
/// provider.resolve(&COUNT, &(), 1)?;
/// client.query(&COUNT, &())?;
/// provider.reset(&COUNT, &())?;
/// client.query(&COUNT, &())?;
///
/// assert_eq!(everything.len(), 3);
/// assert_eq!(stale.len(), 1);
/// # Ok::<(), query_swr::QueryError>(())
/// ```
pub struct EventSinkTracer {
    sink: Box<dyn EventSink>,
}

impl EventSinkTracer {
    /// Create a tracer wrapping the given sink.
    pub fn new(sink: impl EventSink) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }
}

impl Tracer for EventSinkTracer {
    #[inline]
    fn on_cache_read(&self, key: &QueryKey, hit: bool) {
        self.sink.emit(CacheEvent::CacheRead {
            key: key.to_string(),
            hit,
        });
    }

    #[inline]
    fn on_cache_write(&self, key: &QueryKey, value: &dyn CacheValue, changed: bool) {
        self.sink.emit(CacheEvent::CacheWrite {
            key: key.to_string(),
            type_name: value.type_name().to_string(),
            value_debug: format!("{:?}", value),
            changed,
        });
    }

    #[inline]
    fn on_cache_delete(&self, key: &QueryKey, existed: bool) {
        self.sink.emit(CacheEvent::CacheDelete {
            key: key.to_string(),
            existed,
        });
    }

    #[inline]
    fn on_stale_served(&self, key: &QueryKey) {
        self.sink.emit(CacheEvent::StaleServed {
            key: key.to_string(),
        });
    }
}
