//! Counters describing how the render cache has been used.

use serde::Serialize;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered with a settled artifact.
    pub hits: u64,
    /// Lookups that joined an in-flight computation.
    pub pending_hits: u64,
    /// Lookups that started a computation.
    pub misses: u64,
    /// Computations settled with an image.
    pub completed: u64,
    /// Computations settled with a compile, render or panic error.
    pub failed: u64,
    /// Computations settled by the deadline watchdog.
    pub timeouts: u64,
    /// Computation results discarded because the entry had already settled
    /// (usually by its deadline) or was gone.
    pub superseded: u64,
    /// Entries removed by the TTL phase.
    pub expired: u64,
    /// Entries removed by the capacity phase.
    pub overflow: u64,
    /// Compiled-form cache hits.
    pub compiled_hits: u64,
    /// Compiled-form cache misses.
    pub compiled_misses: u64,
    /// Entries currently in the registry.
    pub entries: usize,
}

impl CacheStats {
    /// Total lookups seen by the registry.
    #[inline]
    pub fn lookups(&self) -> u64 {
        self.hits + self.pending_hits + self.misses
    }

    /// Share of lookups that did not start a computation.
    ///
    /// Returns `0.0` before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            return 0.0;
        }
        (self.hits + self.pending_hits) as f64 / lookups as f64
    }
}
