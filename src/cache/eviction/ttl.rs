//! TTL (Time-To-Live) expiry.
//!
//! Expiry is measured from an entry's last touch, not from its insertion: a
//! chart that is still being re-requested by every preview pass never
//! expires, while one that scrolled out of view ages out after the TTL.
//!
//! # Examples
//!
//! ```rust
//! use chartcache::cache::eviction::TtlFilter;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let ttl = TtlFilter::new(Duration::from_secs(300));
//! let touched = Instant::now();
//!
//! assert!(!ttl.is_expired(touched, touched + Duration::from_secs(300)));
//! assert!(ttl.is_expired(touched, touched + Duration::from_secs(301)));
//! ```

use super::EntryStats;
use std::time::Duration;
use tokio::time::Instant;

/// Selects entries whose last touch is older than a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlFilter {
    ttl: Duration,
}

impl TtlFilter {
    /// Creates a filter with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Gets the TTL duration.
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Checks whether an entry last touched at `last_touched` has expired.
    #[inline]
    pub fn is_expired(&self, last_touched: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_touched) > self.ttl
    }

    /// Checks whether the TTL phase removes an entry: unpinned and expired.
    #[inline]
    pub fn selects(&self, stats: &EntryStats, now: Instant) -> bool {
        !stats.pinned && self.is_expired(stats.last_touched, now)
    }

    /// Returns the keys of every expired, unpinned entry.
    pub fn expired<K, I>(&self, entries: I, now: Instant) -> Vec<K>
    where
        I: IntoIterator<Item = (K, EntryStats)>,
    {
        entries
            .into_iter()
            .filter(|(_, stats)| self.selects(stats, now))
            .map(|(key, _)| key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(last_touched: Instant, pinned: bool) -> EntryStats {
        EntryStats {
            last_touched,
            use_count: 1,
            pinned,
        }
    }

    #[test]
    fn test_ttl_boundary_is_inclusive() {
        let ttl = TtlFilter::new(Duration::from_millis(100));
        let touched = Instant::now();

        assert!(!ttl.is_expired(touched, touched));
        assert!(!ttl.is_expired(touched, touched + Duration::from_millis(100)));
        assert!(ttl.is_expired(touched, touched + Duration::from_millis(101)));
    }

    #[test]
    fn test_clock_skew_never_expires() {
        let ttl = TtlFilter::new(Duration::from_millis(10));
        let now = Instant::now();
        // Touched "after" now
        assert!(!ttl.is_expired(now + Duration::from_secs(1), now));
    }

    #[test]
    fn test_expired_skips_pinned_entries() {
        let ttl = TtlFilter::new(Duration::from_secs(1));
        let old = Instant::now();
        let now = old + Duration::from_secs(5);

        let expired = ttl.expired(
            [
                ("old", stats(old, false)),
                ("old-pending", stats(old, true)),
                ("fresh", stats(now, false)),
            ],
            now,
        );

        assert_eq!(expired, vec!["old"]);
    }
}
