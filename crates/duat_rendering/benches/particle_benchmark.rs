//! # Particle Engine Benchmark
//!
//! REQUIREMENTS:
//! - Update of 2,000 live particles well under 1ms
//! - Render with grid culling under 1ms against a headless target
//!
//! Run with: `cargo bench --package duat_rendering --bench particle_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use duat_rendering::{EffectType, HeadlessTarget, ParticleEngine, ParticleEngineConfig};
use duat_shared::{QualityLevel, Rect};

fn filled_engine(count: usize) -> ParticleEngine {
    let mut engine = ParticleEngine::new(ParticleEngineConfig {
        capacity: count,
        ..ParticleEngineConfig::default()
    });
    engine.apply_quality(&QualityLevel::Ultra.settings());
    engine.set_particle_cap(count);
    let kinds = [EffectType::SandGrain, EffectType::FireSpark, EffectType::MagicGlow];
    let mut spawned = 0;
    let mut i = 0u32;
    while spawned < count {
        #[allow(clippy::cast_precision_loss)]
        let x = (i * 37 % 1920) as f32;
        #[allow(clippy::cast_precision_loss)]
        let y = (i * 53 % 1080) as f32;
        let n = engine.spawn(kinds[i as usize % kinds.len()], x, y, 50, 1.0);
        if n == 0 {
            break;
        }
        spawned += n;
        i += 1;
    }
    engine
}

/// Benchmark: one simulation step over a full pool.
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_update");

    for count in [500, 2_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut engine = filled_engine(count);
            // Tiny steps so the population survives the whole run
            b.iter(|| {
                engine.update(black_box(0.000_1));
                black_box(engine.active_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: cull and draw, full view vs. a quarter of the screen.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_render");
    let mut engine = filled_engine(2_000);
    let mut target = HeadlessTarget::new();

    group.bench_function("full_view", |b| {
        b.iter(|| black_box(engine.render(&mut target, None)));
    });
    group.bench_function("quarter_view", |b| {
        let camera = Rect::new(0.0, 0.0, 960.0, 540.0);
        b.iter(|| black_box(engine.render(&mut target, Some(camera))));
    });

    group.finish();
}

/// Benchmark: burst spawn into an empty pool, then clear.
fn bench_spawn_burst(c: &mut Criterion) {
    c.bench_function("particle_spawn_burst_200", |b| {
        let mut engine = ParticleEngine::default();
        b.iter(|| {
            let n = engine.combat_hit(black_box(400.0), black_box(300.0), 200);
            engine.clear_all();
            black_box(n)
        });
    });
}

criterion_group!(benches, bench_update, bench_render, bench_spawn_burst);
criterion_main!(benches);
