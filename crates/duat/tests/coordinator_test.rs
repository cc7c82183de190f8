//! # Coordinator Integration Test
//!
//! The whole manager on a simulated clock: emergency shedding, pressure
//! edges, configuration rejection, screen preloads and persisted quality.

use std::sync::Arc;
use std::time::{Duration, Instant};

use duat::core::{FixedSampler, ManualClock, PressureEvent};
use duat::rendering::{
    AssetKey, AssetType, EffectType, EntryMetadata, GeneratedSource, HeadlessTarget,
    LoadPriority, PreloadPlan, Surface,
};
use duat::shared::{AlertKind, PerformanceAlert, QualityLevel, ResourceConfig};
use duat::{
    CoordinatorBuilder, EngineEvent, FrameOutcome, PerformanceCoordinator, ScreenType,
    EMERGENCY_PARTICLE_CAP,
};

const GB: u64 = 1024 * 1024 * 1024;

struct Rig {
    duat: PerformanceCoordinator,
    clock: ManualClock,
    sampler: FixedSampler,
}

fn rig_with(config: ResourceConfig, level: Option<QualityLevel>, preloads: PreloadPlan) -> Rig {
    let clock = ManualClock::new();
    let sampler = FixedSampler::new(8 * GB);
    sampler.set_fraction(0.4);
    let mut builder = CoordinatorBuilder::new(config)
        .clock(Arc::new(clock.clone()))
        .memory_sampler(Box::new(sampler.clone()))
        .asset_source(Arc::new(GeneratedSource::new(32, 32)))
        .preloads(preloads)
        .detect_hardware(false)
        .sample_cpu(false);
    if let Some(level) = level {
        builder = builder.initial_quality(level);
    }
    Rig {
        duat: builder.build().unwrap(),
        clock,
        sampler,
    }
}

fn rig(level: QualityLevel) -> Rig {
    let config = ResourceConfig {
        worker_thread_count: 1,
        ..ResourceConfig::default()
    };
    rig_with(config, Some(level), PreloadPlan::new())
}

impl Rig {
    fn frame(&mut self, ms: u64) -> FrameOutcome {
        self.duat.begin_frame();
        self.duat.update(ms as f32 / 1000.0);
        self.clock.advance(Duration::from_millis(ms));
        self.duat.render(&mut HeadlessTarget::new(), None);
        self.duat.end_frame()
    }
}

fn temp_path(name: &str) -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("duat_{name}_{id}.toml"))
}

#[test]
fn test_emergency_sheds_to_protected_set() {
    let mut rig = rig(QualityLevel::Ultra);
    rig.duat
        .particles_mut()
        .spawn(EffectType::SandGrain, 640.0, 360.0, 1800, 1.0);
    assert!(rig.duat.particles().active_count() > EMERGENCY_PARTICLE_CAP);

    for i in 0..80 {
        let metadata = EntryMetadata::for_type(AssetType::CardArt).protected(i % 10 == 0);
        rig.duat
            .cache_mut()
            .put(AssetKey::from(format!("cards/{i}").as_str()), Surface::solid(8, 8, [9, 9, 9, 255]), metadata);
    }
    assert_eq!(rig.duat.cache().len(), 80);

    let alert = PerformanceAlert::new(AlertKind::FrameTimeSpike, 1, 50.0, 33.3);
    let report = rig.duat.handle_alert(alert).expect("spike is an emergency");

    assert!(rig.duat.particles().active_count() <= EMERGENCY_PARTICLE_CAP);
    assert_eq!(report.cache_entries_dropped, 72);
    assert_eq!(rig.duat.cache().len(), 8);
    assert!(rig.duat.cache().iter_lru().all(|entry| entry.metadata.protected));
    assert_eq!(rig.duat.quality().level(), QualityLevel::Ultra);
    assert_eq!(rig.duat.emergency_count(), 1);

    let events = rig.duat.events().drain();
    assert!(matches!(events[0], EngineEvent::PerformanceAlert(_)));
    assert!(matches!(
        events[1],
        EngineEvent::EmergencyOptimization {
            cache_entries_dropped: 72,
            ..
        }
    ));
}

#[test]
fn test_advisory_alert_changes_nothing() {
    let mut rig = rig(QualityLevel::High);
    rig.duat
        .particles_mut()
        .spawn(EffectType::SandGrain, 100.0, 100.0, 800, 1.0);
    let before = rig.duat.particles().active_count();

    let alert = PerformanceAlert::new(AlertKind::PotentialMemoryLeak, 300, 80.0, 50.0);
    assert!(rig.duat.handle_alert(alert).is_none());
    assert_eq!(rig.duat.particles().active_count(), before);
    assert_eq!(rig.duat.emergency_count(), 0);
}

#[test]
fn test_memory_pressure_recovers_once() {
    let mut rig = rig(QualityLevel::High);
    let events = rig.duat.events();

    rig.sampler.set_fraction(0.95);
    for _ in 0..30 {
        rig.frame(16);
    }
    rig.sampler.set_fraction(0.5);
    for _ in 0..300 {
        rig.frame(16);
    }

    let pressure: Vec<PressureEvent> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::MemoryPressure(p) => Some(p),
            _ => None,
        })
        .collect();
    let critical = pressure
        .iter()
        .filter(|p| matches!(p, PressureEvent::Critical { .. }))
        .count();
    let recovered = pressure
        .iter()
        .filter(|p| matches!(p, PressureEvent::Recovered { .. }))
        .count();
    assert_eq!(critical, 1);
    assert_eq!(recovered, 1);
    // The profiler's memory alert is edge-triggered too.
    assert_eq!(rig.duat.emergency_count(), 1);
}

#[test]
fn test_invalid_config_keeps_last_good() {
    let mut rig = rig(QualityLevel::High);
    let before = rig.duat.config().clone();

    let bad = ResourceConfig {
        cache_budget_mb: -5,
        ..before.clone()
    };
    assert!(rig.duat.apply_config(bad).is_err());
    assert_eq!(rig.duat.config(), &before);

    let smaller = ResourceConfig {
        cache_budget_mb: 1,
        max_particles: 700,
        ..before.clone()
    };
    rig.duat.apply_config(smaller).unwrap();
    assert_eq!(rig.duat.cache().budget_bytes(), 1024 * 1024);
    assert_eq!(rig.duat.particles().max_particles(), 700);
    // Pool capacity is structural.
    assert_eq!(rig.duat.particles().stats().capacity as usize, before.max_particles);
}

#[test]
fn test_screen_preloads_arrive() {
    let mut plan = PreloadPlan::new();
    plan.add_rule("combat", "bg/temple", AssetType::Background, LoadPriority::High)
        .add_rule("combat", "ui/hand", AssetType::Ui, LoadPriority::Critical);
    let config = ResourceConfig {
        worker_thread_count: 2,
        ..ResourceConfig::default()
    };
    let mut rig = rig_with(config, Some(QualityLevel::High), plan);
    let events = rig.duat.events();

    assert_eq!(rig.duat.set_screen(ScreenType::Combat), 2);
    // Already in flight: nothing new is queued.
    assert_eq!(rig.duat.set_screen(ScreenType::Combat), 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while rig.duat.cache().len() < 2 && Instant::now() < deadline {
        rig.frame(16);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(rig.duat.cache().len(), 2);
    assert!(rig
        .duat
        .cache()
        .entry(&AssetKey::from("ui/hand"))
        .is_some_and(|entry| entry.metadata.protected));

    let loaded = events
        .drain()
        .iter()
        .filter(|event| matches!(event, EngineEvent::AssetLoaded { result: Ok(_), .. }))
        .count();
    assert_eq!(loaded, 2);
}

#[test]
fn test_sustained_slow_frames_downgrade() {
    let mut rig = rig(QualityLevel::Ultra);
    let events = rig.duat.events();

    let mut change = None;
    for _ in 0..300 {
        if let Some(c) = rig.frame(30).quality_change {
            change = Some(c);
            break;
        }
    }
    let change = change.expect("30ms frames force a downgrade");
    assert_eq!(change.from, QualityLevel::Ultra);
    assert_eq!(change.to, QualityLevel::High);
    assert!(
        rig.duat.particles().max_particles() <= rig.duat.quality().settings().max_particles
    );
    assert!(events
        .drain()
        .iter()
        .any(|event| matches!(event, EngineEvent::QualityChanged { .. })));
}

#[test]
fn test_spiking_frames_still_walk_down_to_minimal() {
    let mut rig = rig(QualityLevel::Ultra);

    // 40 ms is past the 2x-budget spike line, so every frame is an emergency.
    let mut changes = Vec::new();
    for _ in 0..750 {
        let outcome = rig.frame(40);
        assert!(outcome.emergency.is_some());
        changes.extend(outcome.quality_change);
    }

    assert_eq!(changes.len(), 4);
    for change in &changes {
        assert_eq!(change.from.step_down(), Some(change.to));
    }
    assert_eq!(rig.duat.quality().level(), QualityLevel::Minimal);
    assert_eq!(rig.duat.emergency_count(), 750);
    assert!(rig.duat.quality().sample_count() > 0);
}

#[test]
fn test_quality_preference_survives_restart() {
    let path = temp_path("prefs");
    let config = ResourceConfig {
        worker_thread_count: 1,
        preferences_path: Some(path.clone()),
        ..ResourceConfig::default()
    };

    let mut first = rig_with(config.clone(), Some(QualityLevel::Ultra), PreloadPlan::new());
    first.duat.set_quality_level(QualityLevel::Low);
    first.duat.shutdown();
    drop(first);

    let second = rig_with(config, None, PreloadPlan::new());
    assert_eq!(second.duat.quality().level(), QualityLevel::Low);
    assert!(!second.duat.quality().auto_adjust());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_report_round_trips_through_toml() {
    let mut rig = rig(QualityLevel::Medium);
    rig.duat.set_screen(ScreenType::Map);
    for _ in 0..60 {
        rig.frame(16);
    }
    let path = temp_path("report");
    rig.duat.report().save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("screen = \"map\""));
    assert!(text.contains("[cache]"));
    std::fs::remove_file(&path).ok();
}
