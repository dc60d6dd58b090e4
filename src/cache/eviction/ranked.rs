//! Frequency-then-recency ranking for capacity eviction.
//!
//! Survivors of the TTL phase are ordered by `use_count` (descending), then by
//! `last_touched` (descending). A chart that every preview pass re-requests
//! climbs in `use_count` and is kept over one that was merely touched recently.

use super::EntryStats;
use std::cmp::Ordering;

/// Compares two entries by retention priority.
///
/// `Ordering::Less` means `a` should be kept before `b`.
///
/// # Examples
///
/// ```rust
/// use chartcache::cache::eviction::{retention_order, EntryStats};
/// use std::cmp::Ordering;
/// use tokio::time::Instant;
///
/// let now = Instant::now();
/// let busy = EntryStats { last_touched: now, use_count: 9, pinned: false };
/// let idle = EntryStats { last_touched: now, use_count: 2, pinned: false };
///
/// assert_eq!(retention_order(&busy, &idle), Ordering::Less);
/// ```
pub fn retention_order(a: &EntryStats, b: &EntryStats) -> Ordering {
    b.use_count
        .cmp(&a.use_count)
        .then_with(|| b.last_touched.cmp(&a.last_touched))
}

/// Returns the keys that do not fit into `capacity`.
///
/// Pinned entries are never returned but still occupy capacity, so at most
/// `capacity - pinned` settled entries are kept. Ties fall back to key order
/// to keep the result deterministic.
pub fn overflow<K, I>(entries: I, capacity: usize) -> Vec<K>
where
    K: Ord,
    I: IntoIterator<Item = (K, EntryStats)>,
{
    let mut pinned = 0usize;
    let mut settled: Vec<(K, EntryStats)> = Vec::new();

    for (key, stats) in entries {
        if stats.pinned {
            pinned += 1;
        } else {
            settled.push((key, stats));
        }
    }

    let keep = capacity.saturating_sub(pinned);
    if settled.len() <= keep {
        return Vec::new();
    }

    settled.sort_by(|(ka, a), (kb, b)| retention_order(a, b).then_with(|| ka.cmp(kb)));
    settled.drain(keep..).map(|(key, _)| key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn stats(use_count: u64, last_touched: Instant) -> EntryStats {
        EntryStats {
            last_touched,
            use_count,
            pinned: false,
        }
    }

    #[test]
    fn test_frequency_beats_recency() {
        let base = Instant::now();
        let frequent_but_older = stats(10, base);
        let recent_but_rare = stats(1, base + Duration::from_secs(60));

        assert_eq!(
            retention_order(&frequent_but_older, &recent_but_rare),
            Ordering::Less
        );
    }

    #[test]
    fn test_recency_breaks_frequency_ties() {
        let base = Instant::now();
        let older = stats(3, base);
        let newer = stats(3, base + Duration::from_millis(1));

        assert_eq!(retention_order(&newer, &older), Ordering::Less);
    }

    #[test]
    fn test_overflow_drops_lowest_ranked() {
        let base = Instant::now();
        let dropped = overflow(
            [
                ("a", stats(1, base)),
                ("b", stats(5, base)),
                ("c", stats(1, base + Duration::from_secs(1))),
                ("d", stats(3, base)),
            ],
            2,
        );

        // Kept: b (5), d (3). Dropped in rank order: c (newer), a.
        assert_eq!(dropped, vec!["c", "a"]);
    }

    #[test]
    fn test_overflow_under_capacity_is_empty() {
        let base = Instant::now();
        assert!(overflow([("a", stats(1, base))], 1).is_empty());
        assert!(overflow(Vec::<(&str, EntryStats)>::new(), 0).is_empty());
    }

    #[test]
    fn test_pinned_entries_occupy_capacity() {
        let base = Instant::now();
        let pinned = EntryStats {
            last_touched: base,
            use_count: 1,
            pinned: true,
        };

        let dropped = overflow(
            [
                ("pending", pinned),
                ("hot", stats(9, base)),
                ("warm", stats(4, base)),
            ],
            2,
        );

        assert_eq!(dropped, vec!["warm"]);
    }
}
