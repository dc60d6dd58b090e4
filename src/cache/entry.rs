//! Registry entries.

use super::eviction::EntryStats;
use crate::markup::{Artifact, ImmediateResponse};
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Identity of one computation started for a fingerprint.
///
/// Settlements carry the generation they were started with; the registry
/// applies a settlement only while the entry is still pending with that same
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub(crate) u64);

impl Generation {
    /// Raw counter value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Either a finished artifact or an in-flight computation, never both.
#[derive(Debug)]
pub(crate) enum EntryState {
    Ready(Artifact),
    Pending {
        generation: Generation,
        watchdog: Option<AbortHandle>,
    },
}

#[derive(Debug)]
pub(crate) struct CacheEntry {
    state: EntryState,
    last_touched: Instant,
    use_count: u64,
}

impl CacheEntry {
    /// New pending entry. The request that creates it counts as its first use.
    pub(crate) fn pending(generation: Generation, now: Instant) -> Self {
        Self {
            state: EntryState::Pending {
                generation,
                watchdog: None,
            },
            last_touched: now,
            use_count: 1,
        }
    }

    /// Records a read.
    #[inline]
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_touched = now;
        self.use_count = self.use_count.saturating_add(1);
    }

    pub(crate) fn response(&self) -> ImmediateResponse {
        match &self.state {
            EntryState::Ready(artifact) => ImmediateResponse::Ready(artifact.clone()),
            EntryState::Pending { .. } => ImmediateResponse::Pending,
        }
    }

    pub(crate) fn pending_generation(&self) -> Option<Generation> {
        match self.state {
            EntryState::Pending { generation, .. } => Some(generation),
            EntryState::Ready(_) => None,
        }
    }

    /// Attaches the deadline watchdog.
    ///
    /// Hands the handle back if the entry is no longer pending with
    /// `generation`.
    pub(crate) fn attach_watchdog(
        &mut self,
        generation: Generation,
        handle: AbortHandle,
    ) -> Result<(), AbortHandle> {
        match &mut self.state {
            EntryState::Pending {
                generation: current,
                watchdog,
            } if *current == generation => {
                *watchdog = Some(handle);
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Replaces the pending state with `artifact`, returning the watchdog.
    ///
    /// Callers check [`pending_generation`](Self::pending_generation) first.
    pub(crate) fn settle(&mut self, artifact: Artifact, now: Instant) -> Option<AbortHandle> {
        self.last_touched = now;
        match std::mem::replace(&mut self.state, EntryState::Ready(artifact)) {
            EntryState::Pending { watchdog, .. } => watchdog,
            EntryState::Ready(_) => None,
        }
    }

    /// Consumes the entry, yielding its watchdog if still pending.
    pub(crate) fn into_watchdog(self) -> Option<AbortHandle> {
        match self.state {
            EntryState::Pending { watchdog, .. } => watchdog,
            EntryState::Ready(_) => None,
        }
    }

    #[inline]
    pub(crate) fn use_count(&self) -> u64 {
        self.use_count
    }

    #[inline]
    pub(crate) fn stats(&self) -> EntryStats {
        EntryStats {
            last_touched: self.last_touched,
            use_count: self.use_count,
            pinned: matches!(self.state, EntryState::Pending { .. }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pending_entry_counts_first_use() {
        let now = Instant::now();
        let entry = CacheEntry::pending(Generation(7), now);

        assert_eq!(entry.use_count(), 1);
        assert_eq!(entry.pending_generation(), Some(Generation(7)));
        assert_eq!(entry.response(), ImmediateResponse::Pending);
        assert!(entry.stats().pinned);
    }

    #[test]
    fn test_touch_updates_recency_and_frequency() {
        let start = Instant::now();
        let mut entry = CacheEntry::pending(Generation(0), start);
        let later = start + Duration::from_secs(3);

        entry.touch(later);
        entry.touch(later);

        let stats = entry.stats();
        assert_eq!(stats.use_count, 3);
        assert_eq!(stats.last_touched, later);
    }

    #[test]
    fn test_settle_replaces_pending_state() {
        let now = Instant::now();
        let mut entry = CacheEntry::pending(Generation(1), now);

        let watchdog = entry.settle(Artifact::image("<svg/>"), now);
        assert!(watchdog.is_none());
        assert_eq!(entry.pending_generation(), None);
        assert_eq!(entry.response(), ImmediateResponse::Ready(Artifact::image("<svg/>")));
        assert!(!entry.stats().pinned);
        assert!(entry.into_watchdog().is_none());
    }
}
