//! # Soak Test
//!
//! Headless run of the full resource manager on a simulated clock.
//!
//! Frame cost is synthesized from the live particle count, with a periodic
//! hitch, so the quality controller, the emergency path and the periodic
//! optimizer all get exercised in a few seconds of wall time.
//!
//! Usage: `soak_test [frames]` (default 7200, two simulated minutes)

use std::sync::Arc;
use std::time::{Duration, Instant};

use duat::core::{FixedSampler, ManualClock};
use duat::rendering::{
    AssetType, CardKind, GeneratedSource, HeadlessTarget, LoadPriority, PreloadPlan,
};
use duat::shared::{QualityLevel, ResourceConfig};
use duat::{CoordinatorBuilder, EngineEvent, ScreenType};

const GB: u64 = 1024 * 1024 * 1024;

/// Every Nth frame stalls.
const HITCH_EVERY: u64 = 900;

/// Simulated cost of one frame.
fn frame_cost(frame: u64, particles: usize) -> Duration {
    if frame % HITCH_EVERY == HITCH_EVERY - 1 {
        return Duration::from_millis(45);
    }
    #[allow(clippy::cast_precision_loss)]
    let ms = 9.0 + particles as f64 * 0.006;
    Duration::from_secs_f64(ms / 1000.0)
}

fn preload_plan() -> PreloadPlan {
    let mut plan = PreloadPlan::new();
    plan.add_rule("menu", "ui/title", AssetType::Ui, LoadPriority::Critical)
        .add_rule("menu", "bg/desert", AssetType::Background, LoadPriority::High)
        .add_rule("combat", "bg/temple", AssetType::Background, LoadPriority::High)
        .add_rule("combat", "fx/sand", AssetType::ParticleSheet, LoadPriority::Medium)
        .add_rule("map", "bg/nile", AssetType::Background, LoadPriority::High);
    plan
}

fn main() {
    let frames: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(7200);

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║           DUAT SOAK TEST                                         ║");
    println!("║           Particles → Assets → Quality → Memory                  ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  TARGET: 60 FPS, no unbounded growth, every hitch recovered      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let clock = ManualClock::new();
    let sampler = FixedSampler::new(8 * GB);
    sampler.set_fraction(0.45);

    let config = ResourceConfig {
        worker_thread_count: 2,
        ..ResourceConfig::default()
    };
    let mut duat = match CoordinatorBuilder::new(config)
        .clock(Arc::new(clock.clone()))
        .memory_sampler(Box::new(sampler.clone()))
        .asset_source(Arc::new(GeneratedSource::new(128, 128)))
        .preloads(preload_plan())
        .initial_quality(QualityLevel::Ultra)
        .sample_cpu(false)
        .build()
    {
        Ok(duat) => duat,
        Err(err) => {
            eprintln!("Failed to start: {err}");
            std::process::exit(1);
        }
    };
    let events = duat.events();
    let mut target = HeadlessTarget::new();

    let screens = [ScreenType::Menu, ScreenType::Combat, ScreenType::Map, ScreenType::Combat];
    let frames_per_screen = (frames / screens.len() as u64).max(1);

    let mut quality_changes = 0u32;
    let mut alerts = 0u32;
    let mut loads = 0u32;
    let mut worst_frame_ms = 0.0f64;

    println!("Running {frames} frames...");
    let wall_start = Instant::now();

    for frame in 0..frames {
        #[allow(clippy::cast_possible_truncation)]
        let screen = screens[((frame / frames_per_screen) as usize).min(screens.len() - 1)];
        if duat.screen() != Some(screen) {
            let queued = duat.set_screen(screen);
            println!("  [{frame:>6}] screen → {screen} ({queued} preloads)");
        }

        #[allow(clippy::cast_precision_loss)]
        let x = 100.0 + (frame % 600) as f32;
        if screen == ScreenType::Combat && frame % 20 == 0 {
            duat.particles_mut().combat_hit(x, 360.0, 40);
            duat.particles_mut().card_effect(CardKind::Attack, x, 200.0, 1.0);
        }
        if frame % 120 == 0 {
            duat.request_asset(format!("cards/{}", frame % 40), AssetType::CardArt, None);
        }

        duat.begin_frame();
        duat.update(1.0 / 60.0);
        clock.advance(frame_cost(frame, duat.particles().active_count()));
        duat.render(&mut target, None);
        let outcome = duat.end_frame();
        worst_frame_ms = worst_frame_ms.max(outcome.profile.frame_time_ms);

        for event in events.drain() {
            match event {
                EngineEvent::QualityChanged { change, .. } => {
                    quality_changes += 1;
                    println!("  [{frame:>6}] quality {} → {} ({})", change.from, change.to, change.reason.as_str());
                }
                EngineEvent::EmergencyOptimization {
                    particles_released,
                    cache_entries_dropped,
                } => {
                    println!(
                        "  [{frame:>6}] emergency: -{particles_released} particles, -{cache_entries_dropped} cache entries"
                    );
                }
                EngineEvent::PerformanceAlert(_) => alerts += 1,
                EngineEvent::AssetLoaded { .. } => loads += 1,
                EngineEvent::MemoryPressure(_) | EngineEvent::ScreenChanged { .. } => {}
            }
        }
    }

    let wall = wall_start.elapsed();
    duat.shutdown();
    let report = duat.report();

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                        SOAK RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  Frames:              {:>10}                                 ║", report.frames);
    println!("║  Simulated time:      {:>10.1} s                               ║", report.uptime_secs);
    println!("║  Wall time:           {:>10.1} ms                              ║", wall.as_secs_f64() * 1000.0);
    if let Some(summary) = report.summary {
        println!("║  Avg FPS:             {:>10.1}                                 ║", summary.avg_fps);
        println!("║  P95 frame:           {:>10.2} ms                              ║", summary.p95_frame_ms);
        println!("║  Target hit rate:     {:>9.1}%                                 ║", summary.target_hit_rate * 100.0);
    }
    println!("║  Worst frame:         {:>10.2} ms                              ║", worst_frame_ms);
    println!("║  Final quality:       {:>10}                                 ║", report.quality_level.to_string());
    println!("║  Quality changes:     {:>10}                                 ║", quality_changes);
    println!("║  Emergencies:         {:>10}                                 ║", report.emergency_optimizations);
    println!("║  Alerts:              {:>10}                                 ║", alerts);
    println!("║  Assets loaded:       {:>10}                                 ║", loads);
    println!("║  Cache hit rate:      {:>9.1}%                                 ║", report.cache.hit_rate * 100.0);
    println!("║  Events dropped:      {:>10}                                 ║", duat.dropped_events());
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let path = std::env::temp_dir().join("duat_soak_report.toml");
    match report.save(&path) {
        Ok(()) => println!("\nReport written to {}", path.display()),
        Err(err) => eprintln!("\nFailed to write report: {err}"),
    }

    let passed = report.summary.is_some_and(|s| s.avg_fps >= 55.0);
    if passed {
        println!("\n✅ SOAK TEST PASSED");
    } else {
        println!("\n❌ SOAK TEST FAILED: average frame rate below 55 FPS");
        std::process::exit(1);
    }
}
