//! In-memory sink for assertions.

use parking_lot::Mutex;

use crate::events::{CacheEvent, CacheTrace};
use crate::sink::EventSink;

/// Records every event in arrival order.
///
/// Besides the raw trace it answers the questions a stale-while-revalidate
/// test usually asks: which keys were served stale, and what was last
/// written under a key.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use query_swr::{derive_key, FunctionReference, RevalidationCache};
/// use query_swr_inspector::{EventCollector, EventSinkTracer};
///
/// let collector = Arc::new(EventCollector::new());
/// let cache = RevalidationCache::with_tracer(EventSinkTracer::new(collector.clone()));
///
/// let key = derive_key(&FunctionReference::new("items:list"), &()).unwrap();
/// cache.set(&key, 1u32);
/// assert_eq!(collector.last_written(&key.to_string()).as_deref(), Some("1"));
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<CacheEvent>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn trace(&self) -> CacheTrace {
        CacheTrace {
            events: self.events(),
        }
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    /// Keys that had a stale value served, in first-served order.
    pub fn stale_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for event in self.events.lock().iter() {
            if let CacheEvent::StaleServed { key } = event {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    /// `Debug` rendering of the last value that changed the entry under
    /// `key`, or `None` if the entry was deleted afterwards or never written.
    pub fn last_written(&self, key: &str) -> Option<String> {
        self.events
            .lock()
            .iter()
            .rev()
            .filter(|e| e.key() == key && e.is_mutation())
            .find_map(|e| match e {
                CacheEvent::CacheWrite { value_debug, .. } => Some(Some(value_debug.clone())),
                CacheEvent::CacheDelete { .. } => Some(None),
                _ => None,
            })
            .flatten()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: CacheEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale(key: &str) -> CacheEvent {
        CacheEvent::StaleServed {
            key: key.to_string(),
        }
    }

    fn write(key: &str, value: &str, changed: bool) -> CacheEvent {
        CacheEvent::CacheWrite {
            key: key.to_string(),
            type_name: "u32".to_string(),
            value_debug: value.to_string(),
            changed,
        }
    }

    #[test]
    fn test_stale_keys_are_unique_and_ordered() {
        let collector = EventCollector::new();
        collector.emit(stale("b"));
        collector.emit(stale("a"));
        collector.emit(stale("b"));
        assert_eq!(collector.stale_keys(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_last_written_skips_unchanged_writes() {
        let collector = EventCollector::new();
        collector.emit(write("a", "1", true));
        collector.emit(write("a", "2", false));
        collector.emit(write("b", "3", true));
        assert_eq!(collector.last_written("a").as_deref(), Some("1"));

        collector.emit(CacheEvent::CacheDelete {
            key: "a".to_string(),
            existed: true,
        });
        assert_eq!(collector.last_written("a"), None);
        assert_eq!(collector.last_written("c"), None);
    }

    #[test]
    fn test_take_drains() {
        let collector = EventCollector::new();
        collector.emit(stale("a"));
        assert_eq!(collector.take(), vec![stale("a")]);
        assert!(collector.is_empty());
    }
}
