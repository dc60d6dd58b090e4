//! End-to-end tests for the chart renderer.
//!
//! All tests run on a paused clock, so sleeps advance virtual time and the
//! timing assertions are exact.

use chartcache::prelude::*;
use chartcache::Result;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::sleep;

/// Compiler double with call counters and a fixed render latency.
struct ScriptedCompiler {
    compiles: AtomicUsize,
    renders: AtomicUsize,
    render_delay: Duration,
    fail_compile: bool,
}

impl ScriptedCompiler {
    fn new(render_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            compiles: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
            render_delay,
            fail_compile: false,
        })
    }

    fn failing_compile() -> Arc<Self> {
        Arc::new(Self {
            compiles: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
            render_delay: Duration::from_millis(1),
            fail_compile: true,
        })
    }

    fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl ChartCompiler for ScriptedCompiler {
    fn compile(&self, derived: &Value) -> Result<Value> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if self.fail_compile {
            return Err(RenderError::Compile(
                "unknown mark type \"sparkle\"\n    at compile (vl.js:10:3)".into(),
            ));
        }
        Ok(json!({ "marks": [{ "type": derived["mark"].clone() }] }))
    }

    fn render(&self, primary: Arc<Value>) -> BoxFuture<'static, Result<String>> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let delay = self.render_delay;
        async move {
            sleep(delay).await;
            Ok(format!("<svg data-spec='{primary}'/>"))
        }
        .boxed()
    }
}

fn start(compiler: &Arc<ScriptedCompiler>, config: CacheConfig) -> (ChartRenderer, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::new());
    let renderer = ChartRenderer::create(Arc::clone(compiler), host.clone(), config, Handle::current());
    (renderer, host)
}

const BAR: &str = r#"{"mark": "bar"}"#;
const VEGA: &str = r#"{"marks": []}"#;

#[tokio::test(start_paused = true)]
async fn test_primary_request_end_to_end() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(50));
    let (renderer, host) = start(&compiler, CacheConfig::default());

    assert_eq!(renderer.request(RequestKind::Primary, VEGA), MarkupFragment::Pending);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(renderer.request(RequestKind::Primary, VEGA), MarkupFragment::Pending);
    assert_eq!(compiler.renders(), 1);
    assert_eq!(host.refresh_count(), 0);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(host.refresh_count(), 1);
    assert_eq!(
        renderer.request(RequestKind::Primary, VEGA),
        MarkupFragment::Image(r#"<svg data-spec='{"marks":[]}'/>"#.into())
    );
    assert_eq!(compiler.renders(), 1);
    assert_eq!(compiler.compiles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_many_lookups_before_settlement_start_one_render() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(20));
    let (renderer, host) = start(&compiler, CacheConfig::default());

    for _ in 0..100 {
        assert!(renderer.request(RequestKind::Derived, BAR).is_pending());
    }
    sleep(Duration::from_millis(30)).await;

    assert_eq!(compiler.compiles(), 1);
    assert_eq!(compiler.renders(), 1);
    assert_eq!(host.refresh_count(), 1);

    let stats = renderer.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.pending_hits, 99);
}

#[tokio::test(start_paused = true)]
async fn test_derived_compile_failure_is_terminal() {
    let compiler = ScriptedCompiler::failing_compile();
    let (renderer, host) = start(&compiler, CacheConfig::default());

    assert!(renderer.request(RequestKind::Derived, BAR).is_pending());
    sleep(Duration::from_millis(5)).await;

    let expected = MarkupFragment::Error("Compilation failed: unknown mark type \"sparkle\"".into());
    assert_eq!(renderer.request(RequestKind::Derived, BAR), expected);
    assert_eq!(renderer.request(RequestKind::Derived, BAR), expected);

    assert_eq!(compiler.compiles(), 1);
    assert_eq!(compiler.renders(), 0);
    assert_eq!(host.refresh_count(), 1);
    assert!(renderer.compiled_cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_stable_against_late_success() {
    let compiler = ScriptedCompiler::new(Duration::from_secs(1));
    let config = CacheConfig::default().with_render_timeout(Duration::from_millis(100));
    let (renderer, host) = start(&compiler, config);

    assert!(renderer.request(RequestKind::Primary, VEGA).is_pending());

    sleep(Duration::from_millis(110)).await;
    let expected = MarkupFragment::Error("Rendering timed out after 100 ms".into());
    assert_eq!(renderer.request(RequestKind::Primary, VEGA), expected);
    assert_eq!(host.refresh_count(), 1);

    // The real render finishes at 1 s and is discarded.
    sleep(Duration::from_secs(2)).await;
    assert_eq!(renderer.request(RequestKind::Primary, VEGA), expected);
    assert_eq!(host.refresh_count(), 1);

    let stats = renderer.stats();
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.superseded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_expires_idle_entries_under_capacity() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(10));
    let config = CacheConfig::default()
        .with_ttl(Duration::from_secs(1))
        .with_sweep_interval(Duration::from_secs(2));
    let (renderer, _host) = start(&compiler, config);

    renderer.request(RequestKind::Primary, VEGA);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(renderer.registry().len(), 1);

    sleep(Duration::from_secs(5)).await;
    assert!(renderer.registry().is_empty());
    assert_eq!(renderer.stats().expired, 1);

    // Evicted charts render again on the next request.
    assert!(renderer.request(RequestKind::Primary, VEGA).is_pending());
    sleep(Duration::from_millis(20)).await;
    assert_eq!(compiler.renders(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_capacity_keeps_most_used_charts() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(1));
    let config = CacheConfig::default()
        .with_capacity(3)
        .with_soft_margin(100)
        .with_sweep_interval(Duration::ZERO);
    let (renderer, _host) = start(&compiler, config);

    let charts: Vec<String> = (0..5).map(|i| format!(r#"{{"marks": [], "id": {i}}}"#)).collect();
    for chart in &charts {
        renderer.request(RequestKind::Primary, chart);
    }
    sleep(Duration::from_millis(5)).await;

    // Chart i ends up with i + 1 uses.
    for (i, chart) in charts.iter().enumerate() {
        for _ in 0..i {
            renderer.request(RequestKind::Primary, chart);
        }
    }

    let report = renderer.run_eviction();
    assert_eq!(report.expired, 0);
    assert_eq!(report.overflow, 2);
    assert_eq!(report.remaining, 3);

    let cached: Vec<bool> = charts
        .iter()
        .map(|chart| {
            renderer
                .registry()
                .contains(&fingerprint(RequestKind::Primary, chart))
        })
        .collect();
    assert_eq!(cached, vec![false, false, true, true, true]);
}

#[tokio::test(start_paused = true)]
async fn test_compiled_form_outlives_render_entry() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(1));
    let config = CacheConfig::default()
        .with_ttl(Duration::from_secs(1))
        .with_sweep_interval(Duration::ZERO);
    let (renderer, _host) = start(&compiler, config);

    renderer.request(RequestKind::Derived, BAR);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(renderer.run_eviction().expired, 1);

    renderer.request(RequestKind::Derived, BAR);
    sleep(Duration::from_millis(5)).await;

    assert!(matches!(
        renderer.request(RequestKind::Derived, BAR),
        MarkupFragment::Image(_)
    ));
    assert_eq!(compiler.compiles(), 1);
    assert_eq!(compiler.renders(), 2);

    let stats = renderer.stats();
    assert_eq!(stats.compiled_hits, 1);
    assert_eq!(stats.compiled_misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_discards_in_flight_renders() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(50));
    let (renderer, host) = start(&compiler, CacheConfig::default());

    renderer.request(RequestKind::Primary, VEGA);
    renderer.request(RequestKind::Derived, BAR);
    renderer.dispose();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(host.refresh_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_coalescing_host_collapses_refreshes() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(5));
    let refresh = Arc::new(CoalescingRefresh::new());
    let renderer = ChartRenderer::create(
        Arc::clone(&compiler),
        refresh.clone(),
        CacheConfig::default(),
        Handle::current(),
    );

    renderer.request(RequestKind::Primary, VEGA);
    renderer.request(RequestKind::Derived, BAR);
    assert!(!refresh.is_dirty());

    sleep(Duration::from_millis(10)).await;
    assert!(refresh.take_dirty());
    assert!(!refresh.take_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_text_never_enters_the_cache() {
    let compiler = ScriptedCompiler::new(Duration::from_millis(1));
    let (renderer, host) = start(&compiler, CacheConfig::default());

    let fragment = renderer.request(RequestKind::Derived, "{\"mark\": ");
    match fragment {
        MarkupFragment::Error(message) => {
            assert!(message.starts_with("Invalid chart specification"));
        }
        other => panic!("expected error fragment, got {other:?}"),
    }

    sleep(Duration::from_millis(5)).await;
    assert!(renderer.registry().is_empty());
    assert_eq!(compiler.compiles(), 0);
    assert_eq!(host.refresh_count(), 0);
}
