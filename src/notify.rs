//! Notification bridge between the render registry and the host surface.
//!
//! The host exposes a single fire-and-forget action, "request a fresh pass".
//! The registry receives it as an injected [`RefreshHost`] and calls it once
//! per settled computation. Waiting callers never get their own notification:
//! a refresh is global, and the host re-pulls every visible block anyway.

use crate::fingerprint::Fingerprint;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// The host's "request a fresh pass" capability.
///
/// Implementations must not block; the call happens on a runtime worker.
/// Any `Fn() + Send + Sync` closure is a `RefreshHost`.
pub trait RefreshHost: Send + Sync {
    /// Asks the host to re-run its render pass at some later point.
    fn request_refresh(&self);
}

impl<F> RefreshHost for F
where
    F: Fn() + Send + Sync,
{
    #[inline]
    fn request_refresh(&self) {
        self()
    }
}

/// Forwards settlement notifications to the host.
#[derive(Clone)]
pub struct NotificationBridge {
    host: Arc<dyn RefreshHost>,
}

impl NotificationBridge {
    /// Creates a bridge around the host capability.
    pub fn new(host: Arc<dyn RefreshHost>) -> Self {
        Self { host }
    }

    /// Tells the host that `fingerprint` now has a result.
    pub fn notify_updated(&self, fingerprint: &Fingerprint) {
        tracing::trace!(fingerprint = %fingerprint.short(), "requesting host refresh");
        self.host.request_refresh();
    }
}

impl std::fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBridge").finish_non_exhaustive()
    }
}

/// Host adapter that collapses refresh requests into a dirty flag.
///
/// The host polls [`take_dirty`](CoalescingRefresh::take_dirty) from its own
/// frame loop, so any number of settlements between two frames cost one pass.
///
/// # Examples
///
/// ```rust
/// use chartcache::notify::{CoalescingRefresh, RefreshHost};
///
/// let refresh = CoalescingRefresh::new();
/// refresh.request_refresh();
/// refresh.request_refresh();
///
/// assert!(refresh.take_dirty());
/// assert!(!refresh.take_dirty());
/// ```
#[derive(Debug, Default)]
pub struct CoalescingRefresh {
    dirty: AtomicBool,
}

impl CoalescingRefresh {
    /// Creates a clean flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a refresh was requested, and clears the flag.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Returns whether a refresh is outstanding without clearing it.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl RefreshHost for CoalescingRefresh {
    #[inline]
    fn request_refresh(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Host stub that counts refresh requests.
#[derive(Debug, Default)]
pub struct RecordingHost {
    refreshes: AtomicUsize,
}

impl RecordingHost {
    /// Creates a stub with a zero count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refreshes requested so far.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl RefreshHost for RecordingHost {
    fn request_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}
