//! Frame stages and metric categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered phases of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    /// Applying finished background loads, cache maintenance
    Assets,
    /// Game-side update
    Update,
    /// Particle simulation
    Particles,
    /// Memory manager pass
    Memory,
    /// Drawing
    Render,
    /// Quality evaluation
    Quality,
}

impl FrameStage {
    /// Number of stages.
    pub const COUNT: usize = 6;

    /// Every stage in frame order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Assets,
        Self::Update,
        Self::Particles,
        Self::Memory,
        Self::Render,
        Self::Quality,
    ];

    /// Dense index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Update => "update",
            Self::Particles => "particles",
            Self::Memory => "memory",
            Self::Render => "render",
            Self::Quality => "quality",
        }
    }
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milliseconds spent per stage in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    ms: [f64; FrameStage::COUNT],
}

impl StageTimings {
    /// Time in `stage`.
    #[inline]
    #[must_use]
    pub const fn get(&self, stage: FrameStage) -> f64 {
        self.ms[stage.index()]
    }

    /// Adds time to `stage`. A stage timed twice in a frame accumulates.
    #[inline]
    pub fn add(&mut self, stage: FrameStage, ms: f64) {
        if ms.is_finite() && ms > 0.0 {
            self.ms[stage.index()] += ms;
        }
    }

    /// Sum over all stages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.ms.iter().sum()
    }

    /// Fraction of the staged time spent in `stages`. Zero if nothing was
    /// timed.
    #[must_use]
    pub fn share(&self, stages: &[FrameStage]) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        stages.iter().map(|s| self.get(*s)).sum::<f64>() / total
    }

    /// `(stage, ms)` pairs in frame order.
    pub fn iter(&self) -> impl Iterator<Item = (FrameStage, f64)> + '_ {
        FrameStage::ALL.iter().map(move |s| (*s, self.get(*s)))
    }

    /// Element-wise mean of `timings`.
    #[must_use]
    pub fn mean<'a>(timings: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut sum = Self::default();
        let mut count = 0u32;
        for t in timings {
            for (acc, v) in sum.ms.iter_mut().zip(t.ms) {
                *acc += v;
            }
            count += 1;
        }
        if count > 0 {
            for acc in &mut sum.ms {
                *acc /= f64::from(count);
            }
        }
        sum
    }
}

/// Grouping for custom metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileCategory {
    /// Drawing
    Rendering,
    /// Particle engine
    Particles,
    /// Asset cache and loader
    Assets,
    /// Memory manager
    Memory,
    /// Quality controller
    Quality,
    /// Game-side logic
    Game,
}

impl ProfileCategory {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rendering => "rendering",
            Self::Particles => "particles",
            Self::Assets => "assets",
            Self::Memory => "memory",
            Self::Quality => "quality",
            Self::Game => "game",
        }
    }
}
