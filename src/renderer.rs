//! The chart rendering service used by the preview pipeline.

use crate::cache::{
    CacheStats, CompiledFormCache, EvictionReport, RenderRegistry, Sweeper,
};
use crate::compiler::ChartCompiler;
use crate::config::CacheConfig;
use crate::error::{RenderError, Result};
use crate::fingerprint::{fingerprint, RequestKind};
use crate::markup::MarkupFragment;
use crate::notify::{NotificationBridge, RefreshHost};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Turns chart specifications into markup without ever blocking the caller.
///
/// The preview pipeline calls [`request`](ChartRenderer::request) once per
/// chart block on every pass. The first call for a given text starts a
/// background render and returns [`MarkupFragment::Pending`]; when the render
/// settles, the host is asked for a fresh pass, and the next call returns the
/// finished fragment from the cache.
///
/// # Lifecycle
///
/// [`create`](ChartRenderer::create) starts the periodic sweeper on the given
/// runtime. [`dispose`](ChartRenderer::dispose), or dropping the renderer,
/// stops it, aborts every deadline timer, clears both caches, and detaches
/// in-flight renders so their results are discarded silently.
///
/// # Examples
///
/// ```rust,no_run
/// use chartcache::prelude::*;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let refresh = Arc::new(CoalescingRefresh::new());
/// let renderer = ChartRenderer::create(
///     CommandCompiler::default(),
///     refresh.clone(),
///     CacheConfig::default(),
///     tokio::runtime::Handle::current(),
/// );
///
/// let block = r#"{"mark": "bar", "data": {"values": [{"a": 1}]}}"#;
/// let fragment = renderer.request(RequestKind::Derived, block);
/// assert!(fragment.is_pending());
/// # }
/// ```
pub struct ChartRenderer {
    registry: RenderRegistry,
    compiled: Arc<CompiledFormCache>,
    compiler: Arc<dyn ChartCompiler>,
    sweeper: Option<Sweeper>,
}

impl ChartRenderer {
    /// Creates the service.
    ///
    /// # Arguments
    ///
    /// * `compiler` - Compiles derived specifications and renders primary ones
    /// * `host` - Asked for a fresh pass whenever a render settles
    /// * `config` - Cache sizing and timing
    /// * `runtime` - Runtime for renders, deadline timers and the sweeper
    pub fn create<C>(compiler: C, host: Arc<dyn RefreshHost>, config: CacheConfig, runtime: Handle) -> Self
    where
        C: ChartCompiler,
    {
        let registry = RenderRegistry::new(&config, NotificationBridge::new(host), runtime);
        let sweeper = Sweeper::spawn(&registry, config.sweep_interval);

        tracing::debug!(
            capacity = config.capacity,
            soft_margin = config.soft_margin,
            ttl_secs = config.ttl.as_secs(),
            timeout_ms = config.render_timeout.as_millis() as u64,
            "chart renderer created"
        );

        Self {
            registry,
            compiled: Arc::new(CompiledFormCache::new(config.compiled_capacity)),
            compiler: Arc::new(compiler),
            sweeper,
        }
    }

    /// Returns markup for `raw_text` right now.
    ///
    /// Text that is not valid JSON yields an error fragment immediately and
    /// never enters the cache. Otherwise the result is whatever the cache
    /// holds for the text's fingerprint, starting a background render on a
    /// miss.
    pub fn request(&self, kind: RequestKind, raw_text: &str) -> MarkupFragment {
        let spec: Value = match serde_json::from_str(raw_text) {
            Ok(spec) => spec,
            Err(err) => {
                let err = RenderError::from(err);
                tracing::debug!(%kind, error = %err, "rejecting malformed chart specification");
                return MarkupFragment::from_error(&err);
            }
        };

        let key = fingerprint(kind, raw_text);
        let compiler = Arc::clone(&self.compiler);
        let compiled = Arc::clone(&self.compiled);

        self.registry
            .lookup_or_start(key, move || {
                render_spec(compiler, compiled, kind, raw_text.to_owned(), spec)
            })
            .into()
    }

    /// Registry and compiled-form counters.
    pub fn stats(&self) -> CacheStats {
        let (compiled_hits, compiled_misses) = self.compiled.hit_counts();
        CacheStats {
            compiled_hits,
            compiled_misses,
            ..self.registry.stats()
        }
    }

    /// Runs one eviction pass now, outside the periodic schedule.
    pub fn run_eviction(&self) -> EvictionReport {
        self.registry.run_eviction()
    }

    /// The render registry.
    pub fn registry(&self) -> &RenderRegistry {
        &self.registry
    }

    /// The compiled-form cache.
    pub fn compiled_cache(&self) -> &CompiledFormCache {
        &self.compiled
    }

    /// Tears the service down. Equivalent to dropping it.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for ChartRenderer {
    fn drop(&mut self) {
        self.sweeper.take();
        self.compiled.clear();
        tracing::debug!("chart renderer disposed");
    }
}

impl std::fmt::Debug for ChartRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartRenderer")
            .field("registry", &self.registry)
            .field("compiled", &self.compiled)
            .finish_non_exhaustive()
    }
}

/// The background computation for one fingerprint.
async fn render_spec(
    compiler: Arc<dyn ChartCompiler>,
    compiled: Arc<CompiledFormCache>,
    kind: RequestKind,
    text: String,
    spec: Value,
) -> Result<String> {
    let primary = match kind {
        RequestKind::Primary => Arc::new(spec),
        RequestKind::Derived => {
            // Compilation is synchronous; keep it off the worker that drives
            // the deadline timers.
            let compiler = Arc::clone(&compiler);
            tokio::task::spawn_blocking(move || {
                compiled.get_or_compile(&text, || compiler.compile(&spec))
            })
            .await
            .map_err(|_| RenderError::Panicked)??
        }
    };
    compiler.render(primary).await
}
