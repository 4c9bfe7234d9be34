//! Output of one wrapper evaluation.

use crate::cache::{CacheWrite, RevalidationCache};

/// Where the value of an [`Evaluation`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// The live subscription had a result.
    Live,
    /// The live subscription was loading and a cached result stood in.
    Cache,
    /// The live subscription was loading and nothing was cached for the key.
    Loading,
}

/// Value to render plus the cache write to perform once it has been observed.
///
/// The wrapper functions (`single::evaluate`, `batch::evaluate`,
/// `paginated::evaluate`) only read the cache; every mutation is carried in
/// `commit` so the host decides when it lands.
#[derive(Debug, Clone)]
pub struct Evaluation<V> {
    /// What the consumer should see.
    pub value: V,
    /// Origin of `value`.
    pub source: ValueSource,
    /// Deferred write, present when the live result should be remembered.
    pub commit: Option<CacheWrite>,
}

impl<V> Evaluation<V> {
    /// Apply the pending write (if any) and return the value.
    pub fn finish(self, cache: &RevalidationCache) -> V {
        if let Some(write) = self.commit {
            write.apply(cache);
        }
        self.value
    }

    /// Whether the value is a stand-in from the cache.
    pub fn is_stale(&self) -> bool {
        self.source == ValueSource::Cache
    }
}
