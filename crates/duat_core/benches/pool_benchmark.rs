//! # Pool Allocator Benchmark
//!
//! REQUIREMENTS:
//! - Acquire/release of a full 2,000-slot pool well under 100µs
//! - Zero allocations after construction
//!
//! Run with: `cargo bench --package duat_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use duat_core::PoolAllocator;

/// Slot payload roughly the size of a particle.
#[derive(Clone, Copy, Default)]
struct Payload {
    position: [f32; 2],
    velocity: [f32; 2],
    life: f32,
    size: f32,
}

/// Benchmark: fill then drain the pool.
fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_fill_drain");

    for capacity in [500, 2_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                let mut pool: PoolAllocator<Payload> = PoolAllocator::new(capacity);
                b.iter(|| {
                    while pool.allocate(Payload::default()).is_some() {}
                    let freed = pool.retain_mut(|_, _| false);
                    black_box(freed)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: one update-style pass killing a quarter of the pool.
fn bench_retain_quarter(c: &mut Criterion) {
    c.bench_function("pool_retain_quarter_2000", |b| {
        let mut pool: PoolAllocator<Payload> = PoolAllocator::new(2_000);
        b.iter(|| {
            while pool.allocate(Payload { life: 1.0, ..Payload::default() }).is_some() {}
            let freed = pool.retain_mut(|handle, p| {
                p.life -= 0.25;
                p.position[0] += p.velocity[0];
                handle.index() % 4 != 0
            });
            black_box(freed)
        });
    });
}

criterion_group!(benches, bench_fill_drain, bench_retain_quarter);
criterion_main!(benches);
