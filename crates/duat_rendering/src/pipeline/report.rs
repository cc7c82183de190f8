//! Serializable performance report.

use std::path::Path;

use duat_shared::{DuatResult, QualityLevel};
use serde::{Deserialize, Serialize};

use crate::effects::ParticleStats;

use super::bottleneck::Bottleneck;
use super::profiler::{AlertCounts, FrameSummary};
use super::regression::Regression;
use super::stages::{FrameStage, StageTimings};

/// Mean milliseconds per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageBreakdown {
    /// Asset stage
    pub assets_ms: f64,
    /// Update stage
    pub update_ms: f64,
    /// Particle stage
    pub particles_ms: f64,
    /// Memory stage
    pub memory_ms: f64,
    /// Render stage
    pub render_ms: f64,
    /// Quality stage
    pub quality_ms: f64,
}

impl From<&StageTimings> for StageBreakdown {
    fn from(t: &StageTimings) -> Self {
        Self {
            assets_ms: t.get(FrameStage::Assets),
            update_ms: t.get(FrameStage::Update),
            particles_ms: t.get(FrameStage::Particles),
            memory_ms: t.get(FrameStage::Memory),
            render_ms: t.get(FrameStage::Render),
            quality_ms: t.get(FrameStage::Quality),
        }
    }
}

/// Particle engine section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleSection {
    /// Live particles
    pub active: u32,
    /// Current cap
    pub cap: u32,
    /// Pool capacity
    pub capacity: u32,
    /// Particles spawned
    pub created: u64,
    /// Particles released
    pub released: u64,
    /// Spawn requests denied by cap or pool
    pub spawn_shortfall: u64,
}

impl From<&ParticleStats> for ParticleSection {
    fn from(s: &ParticleStats) -> Self {
        Self {
            active: s.active,
            cap: s.cap,
            capacity: s.capacity,
            created: s.created,
            released: s.released,
            spawn_shortfall: s.spawn_shortfall,
        }
    }
}

/// Asset cache and loader section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Cached entries
    pub entries: usize,
    /// Protected entries
    pub protected: usize,
    /// Bytes held
    pub current_bytes: u64,
    /// Byte budget
    pub budget_bytes: u64,
    /// Hits over lookups
    pub hit_rate: f64,
    /// LRU evictions
    pub evictions: u64,
    /// Loads in flight
    pub loads_in_flight: usize,
    /// Failed loads
    pub loads_failed: u64,
}

/// Memory manager section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySection {
    /// Pressure level name
    pub pressure: String,
    /// Tracked records
    pub allocations: usize,
    /// Tracked bytes
    pub tracked_bytes: u64,
    /// Records evicted since startup
    pub evicted_total: u64,
    /// Collection passes run
    pub collections: u64,
}

/// Snapshot of the whole resource manager.
///
/// Scalars come first, then sections; TOML requires plain values before
/// tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Frames profiled
    pub frames: u64,
    /// Seconds of clock time covered
    pub uptime_secs: f64,
    /// Current tier
    pub quality_level: QualityLevel,
    /// Automatic adjustment on?
    pub auto_adjust: bool,
    /// Active screen, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    /// Classified bottleneck, once enough frames exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottleneck: Option<Bottleneck>,
    /// Emergency optimizations performed
    pub emergency_optimizations: u64,
    /// Rolling frame statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<FrameSummary>,
    /// Mean stage timings
    pub stages: StageBreakdown,
    /// Particle engine
    pub particles: ParticleSection,
    /// Asset cache and loader
    pub cache: CacheSection,
    /// Memory manager
    pub memory: MemorySection,
    /// Alert counters
    pub alerts: AlertCounts,
    /// Detected regressions
    #[serde(default)]
    pub regressions: Vec<Regression>,
}

impl PerformanceReport {
    /// TOML document.
    ///
    /// # Errors
    ///
    /// [`duat_shared::DuatError::Serialize`] if a value cannot be represented.
    pub fn to_toml_string(&self) -> DuatResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Writes the TOML document to `path`.
    ///
    /// # Errors
    ///
    /// Serialization or I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> DuatResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
