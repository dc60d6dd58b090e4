//! Render task registry.
//!
//! One entry per fingerprint, moving through a small state machine:
//!
//! ```text
//!            lookup miss                 settle(generation)
//! (absent) ──────────────▶ Pending{gen} ───────────────────▶ Ready(artifact)
//!    ▲                        │   ▲                              │
//!    │                        │   └─ lookup: join, no new task   │
//!    │                        │                                  │
//!    │                        └─ deadline ─▶ Ready(timeout error)│
//!    │                                                           │
//!    └──────────────────────── eviction ◀────────────────────────┘
//! ```
//!
//! A miss starts exactly one computation and one deadline watchdog. Whichever
//! settles first wins; the loser's settlement carries a generation the entry
//! no longer has and is dropped. A terminal error (including a timeout) is an
//! ordinary artifact: it is cached and served until evicted, and the
//! computation is never retried on its own.

use super::entry::{CacheEntry, Generation};
use super::eviction::{EvictionReport, HybridEviction};
use super::stats::CacheStats;
use crate::config::CacheConfig;
use crate::error::RenderError;
use crate::fingerprint::Fingerprint;
use crate::markup::{Artifact, ImmediateResponse};
use crate::notify::NotificationBridge;
use futures::FutureExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Whether a settlement was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The entry moved from pending to ready and the host was notified.
    Applied,
    /// The entry had already settled, was evicted, or belongs to another
    /// generation. Nothing changed.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleCause {
    Finished,
    DeadlineExpired,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: FxHashMap<Fingerprint, CacheEntry>,
    next_generation: u64,
    stats: CacheStats,
    disposed: bool,
}

struct Shared {
    state: Mutex<RegistryState>,
    bridge: NotificationBridge,
    policy: HybridEviction,
    soft_limit: usize,
    render_timeout: Duration,
    runtime: Handle,
}

impl Shared {
    fn settle(
        &self,
        fingerprint: Fingerprint,
        generation: Generation,
        artifact: Artifact,
        cause: SettleCause,
    ) -> SettleOutcome {
        let now = Instant::now();
        let watchdog = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.disposed {
                return SettleOutcome::Superseded;
            }

            let entry = match state.entries.get_mut(&fingerprint) {
                Some(entry) if entry.pending_generation() == Some(generation) => entry,
                _ if cause == SettleCause::DeadlineExpired => {
                    // The computation settled while the watchdog was waking up.
                    tracing::trace!(
                        fingerprint = %fingerprint.short(),
                        generation = generation.get(),
                        "deadline lost the race to settlement"
                    );
                    return SettleOutcome::Superseded;
                }
                _ => {
                    state.stats.superseded += 1;
                    tracing::debug!(
                        fingerprint = %fingerprint.short(),
                        generation = generation.get(),
                        "ignoring superseded settlement"
                    );
                    return SettleOutcome::Superseded;
                }
            };

            match (cause, &artifact) {
                (SettleCause::DeadlineExpired, _) => {
                    state.stats.timeouts += 1;
                    tracing::warn!(
                        fingerprint = %fingerprint.short(),
                        timeout_ms = self.render_timeout.as_millis() as u64,
                        "render deadline expired"
                    );
                }
                (SettleCause::Finished, Artifact::Error(message)) => {
                    state.stats.failed += 1;
                    tracing::debug!(
                        fingerprint = %fingerprint.short(),
                        error = %message,
                        "render failed"
                    );
                }
                (SettleCause::Finished, Artifact::Image(_)) => {
                    state.stats.completed += 1;
                    tracing::debug!(fingerprint = %fingerprint.short(), "render completed");
                }
            }

            entry.settle(artifact, now)
        };

        // The watchdog settling through this path is already finishing.
        if cause == SettleCause::Finished {
            if let Some(watchdog) = watchdog {
                watchdog.abort();
            }
        }

        self.bridge.notify_updated(&fingerprint);
        SettleOutcome::Applied
    }

    fn attach_watchdog(
        &self,
        fingerprint: &Fingerprint,
        generation: Generation,
        handle: AbortHandle,
    ) -> bool {
        let mut state = self.state.lock();
        let rejected = if state.disposed {
            Some(handle)
        } else {
            match state.entries.get_mut(fingerprint) {
                Some(entry) => entry.attach_watchdog(generation, handle).err(),
                None => Some(handle),
            }
        };

        match rejected {
            Some(handle) => {
                handle.abort();
                false
            }
            None => true,
        }
    }

    fn evict_locked(&self, state: &mut RegistryState, now: Instant) -> EvictionReport {
        let plan = self.policy.plan(
            state
                .entries
                .iter()
                .map(|(fingerprint, entry)| (*fingerprint, entry.stats())),
            now,
        );

        for fingerprint in plan.expired.iter().chain(plan.overflow.iter()) {
            state.entries.remove(fingerprint);
        }

        state.stats.expired += plan.expired.len() as u64;
        state.stats.overflow += plan.overflow.len() as u64;

        let report = EvictionReport {
            expired: plan.expired.len(),
            overflow: plan.overflow.len(),
            remaining: state.entries.len(),
        };

        if report.removed() > 0 {
            tracing::info!(
                expired = report.expired,
                overflow = report.overflow,
                remaining = report.remaining,
                "evicted render cache entries"
            );
        }

        report
    }

    fn run_eviction(&self) -> EvictionReport {
        let mut state = self.state.lock();
        if state.disposed {
            return EvictionReport::default();
        }
        self.evict_locked(&mut state, Instant::now())
    }

    fn shutdown(&self) {
        let abandoned = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;

            let mut abandoned = 0usize;
            for (_, entry) in state.entries.drain() {
                if let Some(watchdog) = entry.into_watchdog() {
                    watchdog.abort();
                    abandoned += 1;
                }
            }
            abandoned
        };

        tracing::debug!(abandoned, "render registry disposed");
    }
}

/// Content-addressed registry of render results and in-flight renders.
///
/// # Guarantees
///
/// - At most one computation runs per fingerprint at any time.
/// - Every computation settles exactly once: with its own result, or with a
///   timeout error when its deadline passes first.
/// - The host is notified exactly once per settled computation, and never
///   after the registry is dropped.
///
/// # Thread Safety
///
/// The entry map is behind a single `parking_lot::Mutex` that is never held
/// across an `.await` or while calling the host. Computations and watchdogs
/// run on the runtime passed to [`new`](RenderRegistry::new) and only hold a
/// weak reference to the registry.
///
/// # Examples
///
/// ```rust
/// use chartcache::cache::RenderRegistry;
/// use chartcache::config::CacheConfig;
/// use chartcache::fingerprint::{fingerprint, RequestKind};
/// use chartcache::markup::{Artifact, ImmediateResponse};
/// use chartcache::notify::{NotificationBridge, RecordingHost};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let host = Arc::new(RecordingHost::new());
/// let registry = RenderRegistry::new(
///     &CacheConfig::default(),
///     NotificationBridge::new(host.clone()),
///     tokio::runtime::Handle::current(),
/// );
///
/// let fp = fingerprint(RequestKind::Primary, r#"{"marks":[]}"#);
/// let first = registry.lookup_or_start(fp, || async { Ok("<svg/>".to_string()) });
/// assert_eq!(first, ImmediateResponse::Pending);
///
/// tokio::time::sleep(std::time::Duration::from_millis(10)).await;
///
/// // Settled: the second closure is never polled.
/// let second = registry.lookup_or_start(fp, || async { Ok("<svg>other</svg>".to_string()) });
/// assert_eq!(second, ImmediateResponse::Ready(Artifact::image("<svg/>")));
/// assert_eq!(host.refresh_count(), 1);
/// # }
/// ```
pub struct RenderRegistry {
    shared: Arc<Shared>,
}

impl RenderRegistry {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `config` - Capacity, soft margin, TTL and render deadline
    /// * `bridge` - Where settlement notifications go
    /// * `runtime` - Runtime that computations and watchdogs are spawned on
    pub fn new(config: &CacheConfig, bridge: NotificationBridge, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState::default()),
                bridge,
                policy: HybridEviction::from_config(config),
                soft_limit: config.soft_limit(),
                render_timeout: config.render_timeout,
                runtime,
            }),
        }
    }

    /// Returns the cached response for `fingerprint`, starting `compute` on a
    /// miss.
    ///
    /// Never blocks on the computation. A hit on a settled entry returns its
    /// artifact; a hit on a pending entry returns [`ImmediateResponse::Pending`]
    /// without starting anything. Both count as a use of the entry. On a miss
    /// `compute` is called once and its future is spawned alongside a
    /// deadline watchdog.
    ///
    /// A panic inside the future settles the entry with
    /// [`RenderError::Panicked`].
    pub fn lookup_or_start<F, Fut>(&self, fingerprint: Fingerprint, compute: F) -> ImmediateResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, RenderError>> + Send + 'static,
    {
        let now = Instant::now();
        let generation = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;

            if let Some(entry) = state.entries.get_mut(&fingerprint) {
                entry.touch(now);
                let response = entry.response();
                if response.is_pending() {
                    state.stats.pending_hits += 1;
                } else {
                    state.stats.hits += 1;
                }
                return response;
            }

            let generation = Generation(state.next_generation);
            state.next_generation += 1;
            state.stats.misses += 1;
            state
                .entries
                .insert(fingerprint, CacheEntry::pending(generation, now));

            if state.entries.len() > self.shared.soft_limit {
                self.shared.evict_locked(state, now);
            }

            generation
        };

        tracing::debug!(
            fingerprint = %fingerprint.short(),
            generation = generation.get(),
            "starting render"
        );
        self.spawn_computation(fingerprint, generation, now, compute);
        ImmediateResponse::Pending
    }

    fn spawn_computation<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        generation: Generation,
        started: Instant,
        compute: F,
    ) where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, RenderError>> + Send + 'static,
    {
        let timeout = self.shared.render_timeout;
        let deadline = started + timeout;
        let weak = Arc::downgrade(&self.shared);

        let watchdog = self.shared.runtime.spawn({
            let weak = Weak::clone(&weak);
            async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(shared) = weak.upgrade() {
                    shared.settle(
                        fingerprint,
                        generation,
                        Artifact::error(&RenderError::Timeout(timeout)),
                        SettleCause::DeadlineExpired,
                    );
                }
            }
        });

        if !self
            .shared
            .attach_watchdog(&fingerprint, generation, watchdog.abort_handle())
        {
            return;
        }

        let computation = compute();
        self.shared.runtime.spawn(async move {
            let result = AssertUnwindSafe(computation)
                .catch_unwind()
                .await
                .unwrap_or(Err(RenderError::Panicked));

            if let Some(shared) = weak.upgrade() {
                shared.settle(
                    fingerprint,
                    generation,
                    Artifact::from(result),
                    SettleCause::Finished,
                );
            }
        });
    }

    /// Settles the pending computation `generation` of `fingerprint`.
    ///
    /// Applied only while the entry is still pending with that generation;
    /// anything else returns [`SettleOutcome::Superseded`] and changes
    /// nothing. Computations started by
    /// [`lookup_or_start`](Self::lookup_or_start) settle themselves; this is
    /// for hosts that want to resolve an entry from outside.
    pub fn settle(
        &self,
        fingerprint: Fingerprint,
        generation: Generation,
        artifact: Artifact,
    ) -> SettleOutcome {
        self.shared
            .settle(fingerprint, generation, artifact, SettleCause::Finished)
    }

    /// Returns the current response without touching the entry.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<ImmediateResponse> {
        self.shared
            .state
            .lock()
            .entries
            .get(fingerprint)
            .map(CacheEntry::response)
    }

    /// Checks whether `fingerprint` has an entry, pending or settled.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.shared.state.lock().entries.contains_key(fingerprint)
    }

    /// Generation of the in-flight computation for `fingerprint`, if any.
    pub fn pending_generation(&self, fingerprint: &Fingerprint) -> Option<Generation> {
        self.shared
            .state
            .lock()
            .entries
            .get(fingerprint)
            .and_then(CacheEntry::pending_generation)
    }

    /// How often `fingerprint` has been requested since it was inserted.
    pub fn use_count(&self, fingerprint: &Fingerprint) -> Option<u64> {
        self.shared
            .state
            .lock()
            .entries
            .get(fingerprint)
            .map(CacheEntry::use_count)
    }

    /// Number of entries, pending and settled.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Returns `true` if the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registry counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }

    /// Runs one eviction pass now.
    pub fn run_eviction(&self) -> EvictionReport {
        self.shared.run_eviction()
    }

    /// Drops every entry and stops all watchdogs.
    ///
    /// Computations still running are abandoned: their results are discarded
    /// and the host is not notified.
    pub fn dispose(self) {
        drop(self);
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.shared))
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }
}

impl Drop for RenderRegistry {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl std::fmt::Debug for RenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRegistry")
            .field("entries", &self.len())
            .field("policy", &self.shared.policy)
            .field("render_timeout", &self.shared.render_timeout)
            .finish_non_exhaustive()
    }
}

/// Registry handle that does not keep the registry alive.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<Shared>);

impl WeakRegistry {
    /// Runs an eviction pass if the registry still exists.
    pub(crate) fn run_eviction(&self) -> Option<EvictionReport> {
        self.0.upgrade().map(|shared| shared.run_eviction())
    }
}
