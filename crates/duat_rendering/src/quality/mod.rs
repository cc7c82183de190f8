//! # Quality Control
//!
//! This module provides:
//! - `QualityController` - the five-tier state machine with upgrade hysteresis
//! - `HardwareProfile` / `CpuMonitor` - machine class and load via `sysinfo`
//! - `QualityPreferences` - the persisted tier record

mod controller;
mod hardware;
mod preferences;

pub use controller::{
    ChangeReason, QualityChange, QualityController, QualityControllerConfig, Recommendation,
    DOWNGRADE_RATIO, FPS_WINDOW, MIN_SAMPLES, P95_HEADROOM, UPGRADE_RATIO,
};
pub use hardware::{CpuMonitor, HardwareProfile, HardwareTier};
pub use preferences::QualityPreferences;
