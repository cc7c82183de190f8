//! Hardware detection and CPU load sampling.
//!
//! Detection reads total RAM and logical core count through `sysinfo`. There
//! is no portable GPU query, so the GPU tier is inferred from RAM.

use duat_shared::QualityLevel;
use serde::{Deserialize, Serialize};
use sysinfo::System;

const GB: u64 = 1024 * 1024 * 1024;

/// Coarse machine class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareTier {
    /// Workstation class.
    Enthusiast,
    /// Recent gaming machine.
    HighEnd,
    /// Mainstream.
    MidRange,
    /// Older or integrated.
    Budget,
    /// Anything weaker.
    LowEnd,
}

impl HardwareTier {
    /// Initial tier when no preference record exists.
    #[must_use]
    pub const fn recommended_level(self) -> QualityLevel {
        match self {
            Self::Enthusiast => QualityLevel::Ultra,
            Self::HighEnd => QualityLevel::High,
            Self::MidRange => QualityLevel::Medium,
            Self::Budget => QualityLevel::Low,
            Self::LowEnd => QualityLevel::Minimal,
        }
    }

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enthusiast => "enthusiast",
            Self::HighEnd => "high_end",
            Self::MidRange => "mid_range",
            Self::Budget => "budget",
            Self::LowEnd => "low_end",
        }
    }
}

impl std::fmt::Display for HardwareTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What detection found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareProfile {
    /// Installed RAM.
    pub total_memory_bytes: u64,
    /// Logical CPU cores.
    pub logical_cores: usize,
    /// Inferred GPU class, 1 (weak) to 5 (strong).
    pub gpu_tier: u8,
    /// CPU score in `[0.4, 1.0]`.
    pub cpu_score: f32,
    /// Resulting class.
    pub tier: HardwareTier,
}

impl HardwareProfile {
    /// Probes this machine.
    #[must_use]
    pub fn detect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();

        let mut cores = system.cpus().len();
        if cores == 0 {
            cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        }
        let profile = Self::classify(system.total_memory(), cores);
        tracing::info!(
            memory_gb = profile.memory_gb(),
            cores = profile.logical_cores,
            tier = %profile.tier,
            "Detected hardware"
        );
        profile
    }

    /// Classifies a machine from RAM and core count.
    #[must_use]
    pub fn classify(total_memory_bytes: u64, logical_cores: usize) -> Self {
        let gb = total_memory_bytes / GB;
        let gpu_tier = match gb {
            32.. => 5,
            16..=31 => 3,
            8..=15 => 2,
            _ => 1,
        };
        let cpu_score = match logical_cores {
            16.. => 1.0,
            12..=15 => 0.8,
            8..=11 => 0.6,
            _ => 0.4,
        };

        let tier = if gpu_tier >= 4 && gb >= 16 && cpu_score >= 0.8 {
            HardwareTier::Enthusiast
        } else if gpu_tier >= 3 && gb >= 12 && cpu_score >= 0.7 {
            HardwareTier::HighEnd
        } else if gpu_tier >= 2 && gb >= 8 && cpu_score >= 0.6 {
            HardwareTier::MidRange
        } else if gpu_tier >= 1 && gb >= 6 && cpu_score >= 0.4 {
            HardwareTier::Budget
        } else {
            HardwareTier::LowEnd
        };

        Self {
            total_memory_bytes,
            logical_cores,
            gpu_tier,
            cpu_score,
            tier,
        }
    }

    /// RAM in gigabytes.
    #[must_use]
    pub fn memory_gb(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let gb = self.total_memory_bytes as f64 / GB as f64;
        gb
    }
}

/// Global CPU usage sampler.
///
/// `sysinfo` computes usage as a delta between refreshes, so the first
/// sample after construction reads zero.
pub struct CpuMonitor {
    system: System,
}

impl CpuMonitor {
    /// Creates a monitor and takes the baseline refresh.
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }

    /// Usage across all cores in `[0, 1]`.
    pub fn sample(&mut self) -> f32 {
        self.system.refresh_cpu_usage();
        (self.system.global_cpu_usage() / 100.0).clamp(0.0, 1.0)
    }
}

impl Default for CpuMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuMonitor").finish_non_exhaustive()
    }
}
