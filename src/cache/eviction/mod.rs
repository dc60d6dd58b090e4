//! Hybrid eviction policy for the render registry.
//!
//! Eviction runs in two phases over a snapshot of entry metadata:
//!
//! ```text
//! ┌──────────────────────────────┐      ┌────────────────────────────────────┐
//! │ Phase 1: TtlFilter           │      │ Phase 2: ranked overflow           │
//! │ drop every settled entry     │ ───▶ │ survivors > capacity?              │
//! │ untouched for longer than TTL│      │ rank by (use_count ↓, touched ↓),  │
//! └──────────────────────────────┘      │ keep the top `capacity`            │
//!                                       └────────────────────────────────────┘
//! ```
//!
//! Pending entries are pinned: neither phase removes them. Removing one would
//! let a second computation start for a fingerprint whose first computation
//! is still running. They still count toward capacity in phase 2, and their
//! deadline watchdog bounds how long they stay pinned.
//!
//! # Triggers
//!
//! - **Periodic**: the registry sweeper runs a pass every `sweep_interval`.
//! - **Opportunistic**: an insertion that pushes the registry above
//!   `capacity + soft_margin` runs a pass immediately.
//!
//! # Examples
//!
//! ```rust
//! use chartcache::cache::eviction::{EntryStats, HybridEviction};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let policy = HybridEviction::new(Duration::from_secs(60), 1);
//! let start = Instant::now();
//! let now = start + Duration::from_secs(120);
//! let entry = |use_count, touched_at_secs| EntryStats {
//!     last_touched: start + Duration::from_secs(touched_at_secs),
//!     use_count,
//!     pinned: false,
//! };
//!
//! let plan = policy.plan(
//!     [("stale", entry(9, 0)), ("hot", entry(4, 119)), ("cold", entry(1, 119))],
//!     now,
//! );
//!
//! assert_eq!(plan.expired, vec!["stale"]);
//! assert_eq!(plan.overflow, vec!["cold"]);
//! ```

mod ranked;
mod ttl;

pub use ranked::{overflow, retention_order};
pub use ttl::TtlFilter;

use crate::config::CacheConfig;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Metadata snapshot the policy ranks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStats {
    /// Last read or write.
    pub last_touched: Instant,
    /// Number of reads, including the one that created the entry.
    pub use_count: u64,
    /// Pinned entries (in-flight computations) are never evicted.
    pub pinned: bool,
}

/// Keys selected for removal by one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionPlan<K> {
    /// Removed by the TTL phase.
    pub expired: Vec<K>,
    /// Removed by the capacity phase.
    pub overflow: Vec<K>,
}

impl<K> EvictionPlan<K> {
    /// Returns `true` if nothing is to be removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.overflow.is_empty()
    }
}

/// Outcome of an applied eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Entries removed by the TTL phase.
    pub expired: usize,
    /// Entries removed by the capacity phase.
    pub overflow: usize,
    /// Entries left in the registry.
    pub remaining: usize,
}

impl EvictionReport {
    /// Total number of removed entries.
    #[inline]
    pub fn removed(&self) -> usize {
        self.expired + self.overflow
    }
}

/// TTL expiry followed by frequency/recency capacity trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridEviction {
    ttl: TtlFilter,
    capacity: usize,
}

impl HybridEviction {
    /// Creates a policy with the given TTL and hard capacity.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl: TtlFilter::new(ttl),
            capacity,
        }
    }

    /// Creates the policy described by `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.capacity)
    }

    /// Hard capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// TTL phase.
    #[inline]
    pub fn ttl(&self) -> TtlFilter {
        self.ttl
    }

    /// Plans a pass over `entries` as of `now`.
    pub fn plan<K, I>(&self, entries: I, now: Instant) -> EvictionPlan<K>
    where
        K: Ord + Copy,
        I: IntoIterator<Item = (K, EntryStats)>,
    {
        let (expired, survivors): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(_, stats)| self.ttl.selects(stats, now));
        let expired: Vec<K> = expired.into_iter().map(|(key, _)| key).collect();

        let overflow = if survivors.len() > self.capacity {
            ranked::overflow(survivors, self.capacity)
        } else {
            Vec::new()
        };

        EvictionPlan { expired, overflow }
    }
}
