//! Where cache events go.
//!
//! An [`EventSink`] receives every [`CacheEvent`] an
//! [`EventSinkTracer`](crate::EventSinkTracer) produces. Sinks compose:
//! [`FilterSink`] narrows the stream (say, to stale substitutions only) and
//! [`MultiplexSink`] fans it out, so one cache can feed an in-memory
//! collector for assertions and a `tracing` sink for logs at the same time.

use std::sync::Arc;

use crate::events::CacheEvent;

/// Receiver of cache events.
///
/// Called synchronously from whichever thread touched the cache, so
/// implementations should be cheap.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use query_swr_inspector::{CacheEvent, EventSink};
///
/// #[derive(Default)]
/// struct StaleCounter(AtomicUsize);
///
/// impl EventSink for StaleCounter {
///     fn emit(&self, event: CacheEvent) {
///         if matches!(event, CacheEvent::StaleServed { .. }) {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventSink: Send + Sync + 'static {
    /// Called when an event occurs.
    fn emit(&self, event: CacheEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: CacheEvent) {
        (**self).emit(event)
    }
}

/// Forwards every event to each child sink, in insertion order.
#[derive(Default)]
pub struct MultiplexSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiplexSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    /// Add a child sink.
    pub fn with<S: EventSink>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of child sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for MultiplexSink {
    fn emit(&self, event: CacheEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

/// Forwards only the events accepted by `filter`.
pub struct FilterSink<F, S>
where
    F: Fn(&CacheEvent) -> bool + Send + Sync + 'static,
    S: EventSink,
{
    filter: F,
    inner: S,
}

impl<F, S> FilterSink<F, S>
where
    F: Fn(&CacheEvent) -> bool + Send + Sync + 'static,
    S: EventSink,
{
    pub fn new(filter: F, inner: S) -> Self {
        Self { filter, inner }
    }

    /// The wrapped sink.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: EventSink> FilterSink<fn(&CacheEvent) -> bool, S> {
    /// Pass on stale substitutions only.
    pub fn stale_only(inner: S) -> Self {
        Self::new(|event| matches!(event, CacheEvent::StaleServed { .. }), inner)
    }

    /// Pass on events that changed the cache contents only.
    pub fn mutations_only(inner: S) -> Self {
        Self::new(CacheEvent::is_mutation, inner)
    }
}

impl<F, S> EventSink for FilterSink<F, S>
where
    F: Fn(&CacheEvent) -> bool + Send + Sync + 'static,
    S: EventSink,
{
    fn emit(&self, event: CacheEvent) {
        if (self.filter)(&event) {
            self.inner.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::EventCollector;

    fn stale(key: &str) -> CacheEvent {
        CacheEvent::StaleServed {
            key: key.to_string(),
        }
    }

    fn write(key: &str, changed: bool) -> CacheEvent {
        CacheEvent::CacheWrite {
            key: key.to_string(),
            type_name: "u32".to_string(),
            value_debug: "1".to_string(),
            changed,
        }
    }

    #[test]
    fn test_multiplex_preserves_order_per_child() {
        let all = Arc::new(EventCollector::new());
        let stale_only = Arc::new(EventCollector::new());
        let sink = MultiplexSink::default()
            .with(all.clone())
            .with(FilterSink::stale_only(stale_only.clone()));
        assert_eq!(sink.len(), 2);

        sink.emit(write("a", true));
        sink.emit(stale("a"));
        sink.emit(stale("b"));

        assert_eq!(all.events(), vec![write("a", true), stale("a"), stale("b")]);
        assert_eq!(stale_only.events(), vec![stale("a"), stale("b")]);
    }

    #[test]
    fn test_empty_multiplex_drops_events() {
        let sink = MultiplexSink::default();
        assert!(sink.is_empty());
        sink.emit(stale("a"));
    }

    #[test]
    fn test_mutations_only() {
        let sink = FilterSink::mutations_only(EventCollector::new());
        sink.emit(write("a", true));
        sink.emit(write("a", false));
        sink.emit(CacheEvent::CacheRead {
            key: "a".to_string(),
            hit: true,
        });
        assert_eq!(sink.inner().events(), vec![write("a", true)]);
    }
}
