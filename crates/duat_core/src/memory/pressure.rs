//! # Memory Pressure Monitor
//!
//! Samples system memory on a fixed cadence (not every frame) and turns the
//! samples into edge-triggered events.
//!
//! ```text
//!              ≥ warning            ≥ critical
//!   Normal ───────────────► Warning ───────────► Critical
//!     ▲                        │                    │
//!     └──── < warning ─────────┴────────────────────┘   (Recovered, once)
//! ```
//!
//! Falling from Critical to between the thresholds emits nothing; only
//! crossing back below the warning threshold emits `Recovered`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;

/// One memory usage observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    /// Bytes in use
    pub used_bytes: u64,
    /// Bytes installed
    pub total_bytes: u64,
}

impl MemorySample {
    /// Creates a new sample
    #[must_use]
    pub const fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
        }
    }

    /// Used fraction in [0, 1] (zero when total is unknown).
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0) as f32
    }

    /// Used megabytes.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Source of memory samples.
pub trait MemorySampler: Send {
    /// Takes a sample, or `None` if the platform cannot report memory.
    fn sample(&mut self) -> Option<MemorySample>;
}

/// Samples whole-system memory through `sysinfo`.
pub struct SystemMemorySampler {
    system: System,
}

impl SystemMemorySampler {
    /// Creates a sampler. Only memory is refreshed, never process lists.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemMemorySampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMemorySampler").finish_non_exhaustive()
    }
}

impl MemorySampler for SystemMemorySampler {
    fn sample(&mut self) -> Option<MemorySample> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }
        Some(MemorySample::new(self.system.used_memory(), total))
    }
}

/// Sampler reporting whatever it was last told. Clones share state.
///
/// Used by headless runs and tests to script memory usage.
#[derive(Debug, Clone)]
pub struct FixedSampler {
    used: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl FixedSampler {
    /// Creates a sampler with `total_bytes` installed and nothing used.
    #[must_use]
    pub fn new(total_bytes: u64) -> Self {
        Self {
            used: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(total_bytes)),
        }
    }

    /// Sets the bytes in use.
    pub fn set_used(&self, bytes: u64) {
        self.used.store(bytes, Ordering::Release);
    }

    /// Sets usage as a fraction of the total.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn set_fraction(&self, fraction: f64) {
        let total = self.total.load(Ordering::Acquire);
        let used = (total as f64 * fraction.clamp(0.0, 1.0)) as u64;
        self.set_used(used);
    }
}

impl MemorySampler for FixedSampler {
    fn sample(&mut self) -> Option<MemorySample> {
        Some(MemorySample::new(
            self.used.load(Ordering::Acquire),
            self.total.load(Ordering::Acquire),
        ))
    }
}

/// Current pressure classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PressureLevel {
    /// Below the warning threshold
    #[default]
    Normal,
    /// Between the thresholds
    Warning,
    /// At or above the critical threshold
    Critical,
}

/// Edge-triggered pressure transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressureEvent {
    /// Usage crossed the warning threshold from below
    Warning {
        /// Used fraction at the time
        fraction: f32,
    },
    /// Usage crossed the critical threshold
    Critical {
        /// Used fraction at the time
        fraction: f32,
    },
    /// Usage fell back below the warning threshold
    Recovered {
        /// Used fraction at the time
        fraction: f32,
    },
}

/// Threshold state machine with its own sampling cadence.
#[derive(Debug, Clone)]
pub struct PressureMonitor {
    warning: f32,
    critical: f32,
    interval: Duration,
    last_check: Option<Duration>,
    level: PressureLevel,
    last_sample: Option<MemorySample>,
}

impl PressureMonitor {
    /// Creates a monitor.
    #[must_use]
    pub const fn new(warning: f32, critical: f32, interval: Duration) -> Self {
        Self {
            warning,
            critical,
            interval,
            last_check: None,
            level: PressureLevel::Normal,
            last_sample: None,
        }
    }

    /// Current level.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> PressureLevel {
        self.level
    }

    /// Most recent sample.
    #[inline]
    #[must_use]
    pub const fn last_sample(&self) -> Option<MemorySample> {
        self.last_sample
    }

    /// Samples if the cadence allows, then classifies the sample.
    pub fn poll(&mut self, now: Duration, sampler: &mut dyn MemorySampler) -> Option<PressureEvent> {
        if let Some(last) = self.last_check {
            if now.saturating_sub(last) < self.interval {
                return None;
            }
        }
        self.last_check = Some(now);
        let sample = sampler.sample()?;
        self.observe(sample)
    }

    /// Classifies one sample, returning an event only on a transition edge.
    pub fn observe(&mut self, sample: MemorySample) -> Option<PressureEvent> {
        self.last_sample = Some(sample);
        let fraction = sample.fraction();

        if fraction >= self.critical {
            if self.level == PressureLevel::Critical {
                return None;
            }
            self.level = PressureLevel::Critical;
            return Some(PressureEvent::Critical { fraction });
        }

        if fraction >= self.warning {
            return match self.level {
                PressureLevel::Normal => {
                    self.level = PressureLevel::Warning;
                    Some(PressureEvent::Warning { fraction })
                }
                PressureLevel::Critical => {
                    // De-escalation inside the band is silent
                    self.level = PressureLevel::Warning;
                    None
                }
                PressureLevel::Warning => None,
            };
        }

        if self.level == PressureLevel::Normal {
            return None;
        }
        self.level = PressureLevel::Normal;
        Some(PressureEvent::Recovered { fraction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1024 * 1024 * 1024;

    fn monitor() -> PressureMonitor {
        PressureMonitor::new(0.8, 0.9, Duration::from_secs(1))
    }

    #[test]
    fn test_single_recovered_after_critical() {
        let mut monitor = monitor();
        let mut events = Vec::new();
        for used in [50, 95, 96, 85, 70, 60, 50] {
            if let Some(event) = monitor.observe(MemorySample::new(used * GB / 100, GB)) {
                events.push(event);
            }
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PressureEvent::Critical { .. }));
        assert!(matches!(events[1], PressureEvent::Recovered { .. }));
        assert_eq!(monitor.level(), PressureLevel::Normal);
    }

    #[test]
    fn test_warning_then_escalation() {
        let mut monitor = monitor();
        assert!(matches!(
            monitor.observe(MemorySample::new(82 * GB / 100, GB)),
            Some(PressureEvent::Warning { .. })
        ));
        assert!(monitor.observe(MemorySample::new(84 * GB / 100, GB)).is_none());
        assert!(matches!(
            monitor.observe(MemorySample::new(93 * GB / 100, GB)),
            Some(PressureEvent::Critical { .. })
        ));
    }

    #[test]
    fn test_poll_respects_interval() {
        let mut monitor = monitor();
        let mut sampler = FixedSampler::new(GB);
        sampler.set_fraction(0.95);

        assert!(monitor.poll(Duration::ZERO, &mut sampler).is_some());
        sampler.set_fraction(0.1);
        // Too soon: the recovery is not seen yet
        assert!(monitor.poll(Duration::from_millis(500), &mut sampler).is_none());
        assert!(matches!(
            monitor.poll(Duration::from_millis(1000), &mut sampler),
            Some(PressureEvent::Recovered { .. })
        ));
    }

    #[test]
    fn test_unknown_total_is_zero_fraction() {
        assert!(MemorySample::new(10, 0).fraction().abs() < f32::EPSILON);
    }
}
