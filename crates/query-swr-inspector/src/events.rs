//! Event types for cache tracing.
//!
//! Every [`Tracer`](query_swr::Tracer) callback becomes one [`CacheEvent`].
//! Keys and values are stored as strings so a trace can be serialised,
//! shipped elsewhere and loaded back.

use serde::{Deserialize, Serialize};

/// One observed cache operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheEvent {
    /// A lookup.
    CacheRead {
        key: String,
        /// Whether a value of the requested type was found.
        hit: bool,
    },
    /// A write attempt.
    CacheWrite {
        key: String,
        /// Rust type name of the value.
        type_name: String,
        /// `Debug` rendering of the value.
        value_debug: String,
        /// False when an equal value was already stored and nothing changed.
        changed: bool,
    },
    /// A delete, as issued by an invalidating `load_more`.
    CacheDelete {
        key: String,
        existed: bool,
    },
    /// A cached value was handed out while the live subscription loaded.
    StaleServed { key: String },
}

impl CacheEvent {
    /// The key this event concerns.
    pub fn key(&self) -> &str {
        match self {
            CacheEvent::CacheRead { key, .. }
            | CacheEvent::CacheWrite { key, .. }
            | CacheEvent::CacheDelete { key, .. }
            | CacheEvent::StaleServed { key } => key,
        }
    }

    /// Whether this event changed the cache contents.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            CacheEvent::CacheWrite { changed: true, .. } | CacheEvent::CacheDelete { existed: true, .. }
        )
    }
}

/// Ordered list of events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTrace {
    pub events: Vec<CacheEvent>,
}

impl CacheTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CacheEvent) {
        self.events.push(event);
    }

    /// Events concerning `key`, in order.
    pub fn events_for_key(&self, key: &str) -> Vec<&CacheEvent> {
        self.events.iter().filter(|e| e.key() == key).collect()
    }

    /// Number of times a stale value was served.
    pub fn stale_served(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, CacheEvent::StaleServed { .. }))
            .count()
    }

    /// Check if any event matches the predicate.
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&CacheEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }
}

/// Event with the value rendering stripped, for compact assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Read { key: String, hit: bool },
    Write { key: String, changed: bool },
    Delete { key: String, existed: bool },
    Stale { key: String },
}

impl From<&CacheEvent> for EventKind {
    fn from(event: &CacheEvent) -> Self {
        match event {
            CacheEvent::CacheRead { key, hit } => EventKind::Read {
                key: key.clone(),
                hit: *hit,
            },
            CacheEvent::CacheWrite { key, changed, .. } => EventKind::Write {
                key: key.clone(),
                changed: *changed,
            },
            CacheEvent::CacheDelete { key, existed } => EventKind::Delete {
                key: key.clone(),
                existed: *existed,
            },
            CacheEvent::StaleServed { key } => EventKind::Stale { key: key.clone() },
        }
    }
}

/// Convert a trace to its list of [`EventKind`]s.
pub fn to_kinds(trace: &CacheTrace) -> Vec<EventKind> {
    trace.events.iter().map(EventKind::from).collect()
}
