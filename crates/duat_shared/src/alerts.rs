//! Advisory performance alerts.
//!
//! Alerts are control signals, not errors. The coordinator logs them,
//! forwards them to listeners, and reacts to the ones that demand it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert discriminator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A single frame took more than twice the frame budget
    FrameTimeSpike,
    /// Memory usage crossed the high-water mark
    MemoryPressure,
    /// Memory grew monotonically by a large amount over the trailing window
    PotentialMemoryLeak,
}

impl AlertKind {
    /// Stable name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FrameTimeSpike => "frame_time_spike",
            Self::MemoryPressure => "memory_pressure",
            Self::PotentialMemoryLeak => "potential_memory_leak",
        }
    }

    /// Does this alert demand an immediate emergency optimization?
    #[inline]
    #[must_use]
    pub const fn is_emergency(self) -> bool {
        matches!(self, Self::FrameTimeSpike | Self::MemoryPressure)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert raised by the profiler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    /// What happened
    pub kind: AlertKind,
    /// Frame that raised it
    pub frame_number: u64,
    /// Observed value (ms for spikes, fraction for pressure, MB for leaks)
    pub value: f64,
    /// Threshold that was crossed, same unit as `value`
    pub threshold: f64,
}

impl PerformanceAlert {
    /// Creates a new alert
    #[must_use]
    pub const fn new(kind: AlertKind, frame_number: u64, value: f64, threshold: f64) -> Self {
        Self {
            kind,
            frame_number,
            value,
            threshold,
        }
    }
}
