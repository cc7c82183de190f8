//! Bottleneck classification over recent frames.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::profiler::FrameProfile;
use super::stages::{FrameStage, StageTimings};

/// Frames required before classifying.
pub const MIN_FRAMES: usize = 30;
/// Frames considered.
pub const WINDOW: usize = 60;
/// Average memory fraction above which the frame is memory bound.
pub const MEMORY_BOUND: f32 = 0.85;
/// Average CPU load above which the frame is CPU bound.
pub const CPU_BOUND: f32 = 0.80;
/// Average frame time above which stage shares are inspected (ms).
pub const SLOW_FRAME_MS: f64 = 20.0;

/// What is limiting the frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bottleneck {
    /// Simulation or game logic.
    CpuBound,
    /// Drawing.
    GpuBound,
    /// Memory pressure.
    MemoryBound,
    /// Asset streaming.
    IoBound,
    /// Nothing stands out.
    Balanced,
}

impl Bottleneck {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CpuBound => "cpu_bound",
            Self::GpuBound => "gpu_bound",
            Self::MemoryBound => "memory_bound",
            Self::IoBound => "io_bound",
            Self::Balanced => "balanced",
        }
    }
}

impl fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies the last [`WINDOW`] of `frames` (oldest first). `None` with
/// fewer than [`MIN_FRAMES`].
///
/// Checked in order: memory, CPU load, then, for slow frames, which stages
/// dominate.
#[must_use]
pub fn classify<'a, I>(frames: I) -> Option<Bottleneck>
where
    I: IntoIterator<Item = &'a FrameProfile>,
    I::IntoIter: DoubleEndedIterator,
{
    let recent: Vec<&FrameProfile> = frames.into_iter().rev().take(WINDOW).collect();
    if recent.len() < MIN_FRAMES {
        return None;
    }

    if mean_f32(recent.iter().filter_map(|f| f.memory.map(|m| m.fraction())))
        .is_some_and(|m| m > MEMORY_BOUND)
    {
        return Some(Bottleneck::MemoryBound);
    }
    if mean_f32(recent.iter().filter_map(|f| f.cpu_usage)).is_some_and(|c| c > CPU_BOUND) {
        return Some(Bottleneck::CpuBound);
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_ms = recent.iter().map(|f| f.frame_time_ms).sum::<f64>() / recent.len() as f64;
    if avg_ms <= SLOW_FRAME_MS {
        return Some(Bottleneck::Balanced);
    }

    let stages = StageTimings::mean(recent.iter().map(|f| &f.stages));
    if stages.share(&[FrameStage::Particles, FrameStage::Render]) > 0.6 {
        Some(Bottleneck::GpuBound)
    } else if stages.share(&[FrameStage::Assets]) > 0.5 {
        Some(Bottleneck::IoBound)
    } else {
        Some(Bottleneck::CpuBound)
    }
}

fn mean_f32(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0f32, 0u32), |(s, c), v| (s + v, c + 1));
    #[allow(clippy::cast_precision_loss)]
    let mean = (count > 0).then(|| sum / count as f32);
    mean
}
