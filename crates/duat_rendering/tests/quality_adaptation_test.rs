//! # Quality Adaptation Integration Test
//!
//! Drives the controller with a manual clock: sustained slow frames walk the
//! tiers down one step at a time, fast frames walk them up only after the
//! stability window, and spiky frames hold the tier.

use std::time::Duration;

use duat_core::ManualClock;
use duat_rendering::{ChangeReason, QualityChange, QualityController, QualityControllerConfig};
use duat_shared::QualityLevel;

fn controller(level: QualityLevel) -> (QualityController, ManualClock) {
    let clock = ManualClock::new();
    let ctl = QualityController::new(QualityControllerConfig::default(), level, clock.shared());
    (ctl, clock)
}

/// Runs `frames` frames whose times come from `frame_ms(i)`.
fn run<F>(ctl: &mut QualityController, clock: &ManualClock, frames: usize, frame_ms: F) -> Vec<QualityChange>
where
    F: Fn(usize) -> f64,
{
    let mut changes = Vec::new();
    for i in 0..frames {
        let ms = frame_ms(i);
        clock.advance_ms(ms);
        #[allow(clippy::cast_possible_truncation)]
        ctl.record_frame(ms as f32);
        changes.extend(ctl.update());
    }
    changes
}

#[test]
fn test_sustained_slow_frames_step_down_one_tier_at_a_time() {
    let (mut ctl, clock) = controller(QualityLevel::Ultra);
    let changes = run(&mut ctl, &clock, 1_000, |_| 1000.0 / 30.0);

    assert_eq!(changes.len(), 4);
    for change in &changes {
        assert_eq!(change.reason, ChangeReason::Downgrade);
        assert_eq!(change.from.step_down(), Some(change.to));
    }
    assert_eq!(ctl.level(), QualityLevel::Minimal);

    // Nothing below Minimal
    assert!(run(&mut ctl, &clock, 300, |_| 100.0).is_empty());
}

#[test]
fn test_upgrades_wait_for_stability_window() {
    let (mut ctl, clock) = controller(QualityLevel::Minimal);
    let window = QualityControllerConfig::default().stability_window;
    let changes = run(&mut ctl, &clock, 2_500, |_| 8.0);

    assert_eq!(ctl.level(), QualityLevel::Ultra);
    assert_eq!(changes.len(), 4);
    assert!(changes[0].at >= window);

    let mut previous = Duration::ZERO;
    for change in &changes {
        assert_eq!(change.reason, ChangeReason::Upgrade);
        assert_eq!(change.from.step_up(), Some(change.to));
        assert!(change.at - previous >= window, "upgrade without a full stability window");
        previous = change.at;
    }
}

#[test]
fn test_spiky_frames_hold_the_tier() {
    // Mean ≈ 89 FPS, but one frame in ten blows the budget
    let (mut ctl, clock) = controller(QualityLevel::Medium);
    let changes = run(&mut ctl, &clock, 1_200, |i| if i % 10 == 9 { 40.0 } else { 8.0 });

    assert!(changes.is_empty());
    assert_eq!(ctl.level(), QualityLevel::Medium);
    assert!(ctl.stable_for().is_none());
}

#[test]
fn test_recovery_after_slowdown() {
    let (mut ctl, clock) = controller(QualityLevel::High);
    let down = run(&mut ctl, &clock, 200, |_| 25.0);
    assert_eq!(down.len(), 1);
    assert_eq!(ctl.level(), QualityLevel::Medium);

    let up = run(&mut ctl, &clock, 600, |_| 8.0);
    assert!(!up.is_empty());
    assert_eq!(up[0].to, QualityLevel::High);
}

#[test]
fn test_manual_level_pins_the_tier() {
    let (mut ctl, clock) = controller(QualityLevel::High);
    let change = ctl.set_quality_level(QualityLevel::Ultra).expect("changed");
    assert_eq!(change.reason, ChangeReason::Manual);
    assert!(!ctl.auto_adjust());

    assert!(run(&mut ctl, &clock, 600, |_| 50.0).is_empty());
    assert_eq!(ctl.level(), QualityLevel::Ultra);
}
