//! Cache sizing and timing configuration.
//!
//! All knobs are compile-time constants. [`CacheConfig`] gathers them so that
//! embedding hosts and tests can shrink them without touching the defaults.

use std::time::Duration;

/// Maximum number of settled entries kept by the render registry.
pub const DEFAULT_CAPACITY: usize = 128;

/// How far above [`DEFAULT_CAPACITY`] the registry may grow before an
/// opportunistic eviction pass runs on insertion.
pub const DEFAULT_SOFT_MARGIN: usize = 32;

/// Entries untouched for longer than this are dropped on the next pass.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on a single compile-and-render computation.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of compiled derived specifications kept.
pub const DEFAULT_COMPILED_CAPACITY: usize = 64;

/// Interval of the periodic eviction sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Sizing and timing for a [`ChartRenderer`](crate::ChartRenderer).
///
/// # Examples
///
/// ```rust
/// use chartcache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::default()
///     .with_capacity(16)
///     .with_render_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.capacity, 16);
/// assert_eq!(config.soft_limit(), 16 + chartcache::config::DEFAULT_SOFT_MARGIN);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Hard capacity of the render registry.
    pub capacity: usize,
    /// Extra entries tolerated before an insertion triggers eviction.
    pub soft_margin: usize,
    /// Time-to-live measured from an entry's last touch.
    pub ttl: Duration,
    /// Deadline for each computation.
    pub render_timeout: Duration,
    /// Capacity of the compiled-form cache.
    pub compiled_capacity: usize,
    /// Period of the background eviction sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            soft_margin: DEFAULT_SOFT_MARGIN,
            ttl: DEFAULT_TTL,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            compiled_capacity: DEFAULT_COMPILED_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Registry size above which an insertion runs an eviction pass.
    #[inline]
    pub fn soft_limit(&self) -> usize {
        self.capacity.saturating_add(self.soft_margin)
    }

    /// Sets the registry capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the soft margin above capacity.
    pub fn with_soft_margin(mut self, soft_margin: usize) -> Self {
        self.soft_margin = soft_margin;
        self
    }

    /// Sets the time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the render deadline.
    pub fn with_render_timeout(mut self, render_timeout: Duration) -> Self {
        self.render_timeout = render_timeout;
        self
    }

    /// Sets the compiled-form cache capacity.
    pub fn with_compiled_capacity(mut self, compiled_capacity: usize) -> Self {
        self.compiled_capacity = compiled_capacity;
        self
    }

    /// Sets the sweep interval.
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}
