//! # Particle Engine Integration Test
//!
//! Pool conservation, burst clamping, culling and alpha bounds through the
//! public API.

use duat_rendering::effects::VISIBILITY_THRESHOLD;
use duat_rendering::{
    EffectType, HeadlessTarget, Particle, ParticleEngine, ParticleEngineConfig, ParticlePool,
};
use duat_shared::{QualityLevel, Rect, Vec2};

fn engine_with_capacity(capacity: usize) -> ParticleEngine {
    let mut engine = ParticleEngine::new(ParticleEngineConfig {
        capacity,
        ..ParticleEngineConfig::default()
    });
    // Ultra: multiplier 1.0, so requested counts are spawned as-is
    engine.apply_quality(&QualityLevel::Ultra.settings());
    engine
}

fn spark(life: f32) -> Particle {
    Particle::new(
        EffectType::FireSpark,
        Vec2::new(10.0, 10.0),
        Vec2::new(1.0, 0.0),
        2.0,
        life,
        [255, 120, 40],
    )
}

#[test]
fn test_pool_conservation_under_churn() {
    let mut pool = ParticlePool::new(64);
    let mut handles = Vec::new();

    for round in 0..20u32 {
        for _ in 0..(round % 7 + 5) {
            if let Some(handle) = pool.acquire(spark(1.0)) {
                handles.push(handle);
            }
            assert_eq!(pool.available() + pool.in_use(), pool.capacity());
        }
        // Release every third handle, some of them twice
        for (i, handle) in handles.iter().enumerate() {
            if i % 3 == 0 {
                pool.release(*handle);
                pool.release(*handle);
            }
            assert_eq!(pool.available() + pool.in_use(), pool.capacity());
        }
        handles.retain(|h| pool.get(*h).is_some());
    }

    let stats = pool.stats();
    assert_eq!(stats.acquired - stats.released, pool.in_use() as u64);
}

#[test]
fn test_stale_handle_cannot_touch_new_occupant() {
    let mut pool = ParticlePool::new(1);
    let first = pool.acquire(spark(1.0)).expect("slot");
    assert!(pool.release(first));
    let second = pool.acquire(spark(5.0)).expect("slot reused");

    assert!(pool.get(first).is_none());
    assert!(!pool.release(first));
    assert_eq!(pool.get(second).map(|p| p.max_life), Some(5.0));
}

#[test]
fn test_burst_clamped_to_free_room() {
    let mut engine = engine_with_capacity(100);
    assert_eq!(engine.spawn(EffectType::SandGrain, 400.0, 300.0, 80, 1.0), 80);

    let spawned = engine.spawn(EffectType::SandGrain, 400.0, 300.0, 50, 1.0);
    assert!(spawned <= 20);
    assert_eq!(engine.active_count(), 100);
    assert_eq!(engine.pool().in_use(), 100);

    // A full pool spawns nothing and does not fail
    assert_eq!(engine.spawn(EffectType::FireSpark, 0.0, 0.0, 10, 1.0), 0);
    assert!(engine.stats().spawn_shortfall >= 30);
}

#[test]
fn test_everything_expires_back_to_the_pool() {
    let mut engine = engine_with_capacity(500);
    engine.spawn(EffectType::SandGrain, 100.0, 100.0, 200, 1.0);
    engine.spawn(EffectType::MagicGlow, 500.0, 300.0, 100, 1.0);
    assert!(engine.active_count() > 0);

    for _ in 0..600 {
        engine.update(1.0 / 60.0);
    }
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.pool().available(), engine.pool().capacity());
}

#[test]
fn test_camera_culls_offscreen_particles() {
    let mut engine = engine_with_capacity(400);
    engine.spawn(EffectType::SandGrain, 100.0, 100.0, 100, 1.0);
    engine.spawn(EffectType::SandGrain, 1800.0, 1000.0, 100, 1.0);
    engine.update(1.0 / 60.0);

    let mut target = HeadlessTarget::new();
    engine.render(&mut target, Some(Rect::new(0.0, 0.0, 400.0, 400.0)));
    let stats = engine.stats();
    assert!(stats.rendered > 0);
    assert!(stats.culled >= 100);
    assert!(stats.rendered as usize + stats.culled as usize + stats.transparent as usize <= engine.active_count());
}

#[test]
fn test_alpha_stays_in_bounds_over_life() {
    let plain = spark(1.0);
    let faded = spark(2.0).with_fades(0.2, 0.5);

    for mut particle in [plain, faded] {
        let mut previous = particle.alpha;
        let mut steps = 0;
        while particle.update(0.05) {
            steps += 1;
            assert!(particle.life > 0.0 && particle.life <= particle.max_life);
            assert_eq!(particle.is_visible(), particle.alpha >= VISIBILITY_THRESHOLD);
            // Past the fade-in window alpha can only fall
            if particle.fade_in == 0.0 || particle.age() > particle.fade_in + 0.05 {
                assert!(particle.alpha <= previous, "alpha rose at step {steps}");
            }
            previous = particle.alpha;
        }
        assert_eq!(particle.alpha, 0);
        assert_eq!(particle.life, 0.0);
    }
}

#[test]
fn test_cap_active_drops_to_limit() {
    let mut engine = engine_with_capacity(2_000);
    engine.set_particle_cap(2_000);
    let mut total = 0;
    for i in 0..40 {
        total += engine.spawn(EffectType::SandGrain, 10.0 * i as f32, 200.0, 50, 1.0);
    }
    assert_eq!(total, 2_000);

    let dropped = engine.cap_active(500);
    assert_eq!(dropped, 1_500);
    assert_eq!(engine.active_count(), 500);
    assert_eq!(engine.max_particles(), 500);
    assert_eq!(engine.spawn(EffectType::SandGrain, 0.0, 0.0, 10, 1.0), 0);
}
