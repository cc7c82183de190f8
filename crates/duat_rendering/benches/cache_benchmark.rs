//! # Asset Cache Benchmark
//!
//! REQUIREMENTS:
//! - Hits and inserts are O(1) regardless of entry count
//! - Eviction under a full budget stays in the microsecond range
//!
//! Run with: `cargo bench --package duat_rendering --bench cache_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use duat_core::SystemClock;
use duat_rendering::{AssetCache, AssetKey, AssetType, EntryMetadata, Surface};

const ENTRY_SIDE: u32 = 32;
const ENTRY_BYTES: u64 = (ENTRY_SIDE * ENTRY_SIDE * 4) as u64;

fn keys(count: usize) -> Vec<AssetKey> {
    (0..count).map(|i| AssetKey::new(format!("bench/{i}"))).collect()
}

fn filled_cache(keys: &[AssetKey]) -> AssetCache {
    let mut cache = AssetCache::new(ENTRY_BYTES * keys.len() as u64, SystemClock::shared());
    let surface = Surface::solid(ENTRY_SIDE, ENTRY_SIDE, [200, 160, 80, 255]);
    for key in keys {
        cache.put(key.clone(), surface.clone(), EntryMetadata::for_type(AssetType::CardArt));
    }
    cache
}

/// Benchmark: lookups that all hit.
fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get_hit");

    for count in [64, 1_024, 8_192] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let keys = keys(count);
            let mut cache = filled_cache(&keys);
            let mut i = 0;
            b.iter(|| {
                i = (i + 7) % keys.len();
                black_box(cache.get(&keys[i]))
            });
        });
    }

    group.finish();
}

/// Benchmark: inserts into a full cache, each evicting the LRU entry.
fn bench_put_evict(c: &mut Criterion) {
    c.bench_function("cache_put_evict_1024", |b| {
        let keys = keys(1_024);
        let mut cache = filled_cache(&keys);
        let surface = Surface::solid(ENTRY_SIDE, ENTRY_SIDE, [10, 20, 30, 255]);
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let evicted = cache.put(
                AssetKey::new(format!("fresh/{n}")),
                surface.clone(),
                EntryMetadata::for_type(AssetType::CardArt),
            );
            black_box(evicted)
        });
    });
}

criterion_group!(benches, bench_get_hit, bench_put_evict);
criterion_main!(benches);
