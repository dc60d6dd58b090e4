//! Benchmarks for the render registry and eviction policy.

use chartcache::cache::eviction::{EntryStats, HybridEviction};
use chartcache::cache::RenderRegistry;
use chartcache::notify::{NotificationBridge, RecordingHost};
use chartcache::{fingerprint, CacheConfig, Fingerprint, RequestKind};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::Instant;

fn keys(count: usize) -> Vec<Fingerprint> {
    (0..count)
        .map(|i| fingerprint(RequestKind::Primary, &format!(r#"{{"id": {i}}}"#)))
        .collect()
}

fn registry(runtime: &Runtime, config: &CacheConfig) -> RenderRegistry {
    RenderRegistry::new(
        config,
        NotificationBridge::new(Arc::new(RecordingHost::new())),
        runtime.handle().clone(),
    )
}

// Benchmark: lookups that hit settled entries
fn bench_settled_hits(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let config = CacheConfig::default();
    let registry = registry(&runtime, &config);
    let keys = keys(config.capacity);

    runtime.block_on(async {
        for key in &keys {
            registry.lookup_or_start(*key, || async { Ok("<svg/>".to_string()) });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    });

    c.bench_function("registry/settled_hits", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(registry.lookup_or_start(*key, || async { Ok(String::new()) }));
            }
        });
    });
}

// Benchmark: misses that start a computation (includes spawning)
fn bench_misses(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let config = CacheConfig::default().with_capacity(1024);
    let keys = keys(1024);

    c.bench_function("registry/misses_1024", |b| {
        b.iter(|| {
            let registry = registry(&runtime, &config);
            for key in &keys {
                black_box(registry.lookup_or_start(*key, || async { Ok(String::new()) }));
            }
        });
    });
}

// Benchmark: eviction planning over registries of various sizes
fn bench_eviction_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_plan");
    let start = Instant::now();
    let now = start + Duration::from_secs(600);

    for size in [128usize, 1024, 8192] {
        let policy = HybridEviction::new(Duration::from_secs(300), size / 2);
        let entries: Vec<(usize, EntryStats)> = (0..size)
            .map(|i| {
                (
                    i,
                    EntryStats {
                        last_touched: start + Duration::from_millis((i * 97 % 600_000) as u64),
                        use_count: (i * 31 % 17) as u64 + 1,
                        pinned: i % 50 == 0,
                    },
                )
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.iter(|| black_box(policy.plan(entries.iter().copied(), now)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_settled_hits, bench_misses, bench_eviction_plan);

criterion_main!(benches);
