//! Client configuration.

use serde::Deserialize;

/// Runtime switches for [`SwrClient`](crate::SwrClient).
///
/// Deserialisable from any serde format; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SwrConfig {
    /// Serve cached results while a subscription is loading. When false every
    /// entry point is a plain pass-through to the provider.
    pub enable_stale_while_revalidate: bool,
    /// Log every cache read and write with its key and value, and expose the
    /// cache through [`inspect::snapshot`](crate::inspect::snapshot).
    pub enable_debug_logging: bool,
}

impl Default for SwrConfig {
    fn default() -> Self {
        Self {
            enable_stale_while_revalidate: true,
            enable_debug_logging: false,
        }
    }
}

impl SwrConfig {
    /// Configuration that turns the cache off entirely.
    pub fn pass_through() -> Self {
        Self {
            enable_stale_while_revalidate: false,
            ..Self::default()
        }
    }
}
