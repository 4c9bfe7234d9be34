//! Sink that forwards events to the `tracing` crate.

use crate::events::CacheEvent;
use crate::sink::EventSink;

/// Emits every event as a `tracing` debug record under the
/// `query_swr_inspector` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CacheEvent) {
        match event {
            CacheEvent::CacheRead { key, hit } => {
                tracing::debug!(target: "query_swr_inspector", %key, hit, "cache read")
            }
            CacheEvent::CacheWrite {
                key,
                type_name,
                value_debug,
                changed,
            } => tracing::debug!(
                target: "query_swr_inspector",
                %key,
                %type_name,
                value = %value_debug,
                changed,
                "cache write"
            ),
            CacheEvent::CacheDelete { key, existed } => {
                tracing::debug!(target: "query_swr_inspector", %key, existed, "cache delete")
            }
            CacheEvent::StaleServed { key } => {
                tracing::debug!(target: "query_swr_inspector", %key, "stale value served")
            }
        }
    }
}
