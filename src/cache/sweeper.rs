//! Background task running the periodic eviction pass.

use super::registry::RenderRegistry;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Runs [`RenderRegistry::run_eviction`] every `period` until dropped.
///
/// The task only holds a weak handle to the registry and exits on its own
/// once the registry is gone. Dropping the sweeper cancels it.
#[derive(Debug)]
pub struct Sweeper {
    _cancel: DropGuard,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Starts sweeping `registry` on its runtime.
    ///
    /// Returns `None` for a zero `period`, which disables periodic sweeps.
    pub fn spawn(registry: &RenderRegistry, period: Duration) -> Option<Self> {
        if period.is_zero() {
            return None;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = registry.downgrade();

        let task = registry.runtime().spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticks.tick() => {
                        match weak.run_eviction() {
                            Some(report) => tracing::trace!(
                                expired = report.expired,
                                overflow = report.overflow,
                                remaining = report.remaining,
                                "periodic sweep"
                            ),
                            None => break,
                        }
                    }
                }
            }
        });

        Some(Self {
            _cancel: token.drop_guard(),
            task,
        })
    }

    /// Returns `true` once the sweep loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
