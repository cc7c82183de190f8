//! # Resource Manager Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```toml
//! cache_budget_mb = 512
//! max_particles = 2000
//! target_fps = 60.0
//! worker_thread_count = 4
//! auto_quality_adjust = true
//! ```
//!
//! Values are checked by [`ResourceConfig::validate`]; a configuration that
//! fails validation must never be applied.

use crate::constants::{
    BYTES_PER_MB, DEFAULT_CACHE_BUDGET_MB, DEFAULT_GRID_CELL_SIZE,
    DEFAULT_MEMORY_CHECK_INTERVAL_SECS, DEFAULT_MEMORY_CRITICAL_THRESHOLD,
    DEFAULT_MEMORY_WARNING_THRESHOLD, DEFAULT_MAX_PARTICLES, DEFAULT_PROFILER_HISTORY,
    DEFAULT_QUALITY_EVAL_INTERVAL_SECS, DEFAULT_QUALITY_STABILITY_SECS, DEFAULT_SCREEN_HEIGHT,
    DEFAULT_SCREEN_WIDTH, DEFAULT_TARGET_FPS, DEFAULT_WORKER_THREADS, MAX_WORKER_THREADS,
};
use crate::error::{DuatError, DuatResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The recognized configuration surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Asset cache budget in megabytes.
    pub cache_budget_mb: i64,
    /// Hard particle pool capacity.
    pub max_particles: usize,
    /// Frame rate the quality controller aims for.
    pub target_fps: f32,
    /// Background decode workers.
    pub worker_thread_count: usize,
    /// Let the quality controller move between tiers on its own.
    pub auto_quality_adjust: bool,
    /// Viewport width in pixels.
    pub screen_width: u32,
    /// Viewport height in pixels.
    pub screen_height: u32,
    /// Spatial grid cell side in pixels.
    pub grid_cell_size: u32,
    /// Frames kept in the profiler ring buffer.
    pub profiler_history: usize,
    /// Seconds between quality evaluations.
    pub quality_eval_interval_secs: f32,
    /// Seconds good performance must persist before an upgrade.
    pub quality_stability_secs: f32,
    /// Memory fraction that raises a pressure warning.
    pub memory_warning_threshold: f32,
    /// Memory fraction that raises critical pressure.
    pub memory_critical_threshold: f32,
    /// Seconds between memory pressure samples.
    pub memory_check_interval_secs: f32,
    /// Seed for particle parameter randomness.
    pub particle_seed: u64,
    /// Where the quality preference record lives, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences_path: Option<PathBuf>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            cache_budget_mb: DEFAULT_CACHE_BUDGET_MB as i64,
            max_particles: DEFAULT_MAX_PARTICLES,
            target_fps: DEFAULT_TARGET_FPS,
            worker_thread_count: DEFAULT_WORKER_THREADS,
            auto_quality_adjust: true,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            grid_cell_size: DEFAULT_GRID_CELL_SIZE,
            profiler_history: DEFAULT_PROFILER_HISTORY,
            quality_eval_interval_secs: DEFAULT_QUALITY_EVAL_INTERVAL_SECS,
            quality_stability_secs: DEFAULT_QUALITY_STABILITY_SECS,
            memory_warning_threshold: DEFAULT_MEMORY_WARNING_THRESHOLD,
            memory_critical_threshold: DEFAULT_MEMORY_CRITICAL_THRESHOLD,
            memory_check_interval_secs: DEFAULT_MEMORY_CHECK_INTERVAL_SECS,
            particle_seed: 0x5A4D_D0A7,
            preferences_path: None,
        }
    }
}

impl ResourceConfig {
    /// Production config: full cache, full worker pool, preferences on disk.
    #[must_use]
    pub fn production() -> Self {
        Self {
            preferences_path: Some(PathBuf::from("config/quality_settings.toml")),
            ..Self::default()
        }
    }

    /// Low-spec config: small cache, two workers, fewer particles.
    ///
    /// Intended for integrated GPUs and 4 GB machines.
    #[must_use]
    pub fn low_spec() -> Self {
        Self {
            cache_budget_mb: 128,
            max_particles: 600,
            worker_thread_count: 2,
            screen_width: 1280,
            screen_height: 720,
            profiler_history: 600,
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DuatError::Parse`] for malformed TOML or mistyped values.
    /// The result is NOT validated; call [`ResourceConfig::validate`].
    pub fn from_toml_str(document: &str) -> DuatResult<Self> {
        Ok(toml::from_str(document)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`DuatError::Io`] if the file cannot be read, or
    /// [`DuatError::Parse`] if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> DuatResult<Self> {
        let document = std::fs::read_to_string(path)?;
        Self::from_toml_str(&document)
    }

    /// Serializes to a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`DuatError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> DuatResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values that would leave the system inconsistent.
    ///
    /// # Errors
    ///
    /// Returns [`DuatError::InvalidConfig`] naming the first bad option.
    pub fn validate(&self) -> DuatResult<()> {
        if self.cache_budget_mb <= 0 {
            return Err(DuatError::invalid("cache_budget_mb", "must be greater than zero"));
        }
        if self.max_particles == 0 {
            return Err(DuatError::invalid("max_particles", "must be greater than zero"));
        }
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(DuatError::invalid("target_fps", "must be finite and > 0"));
        }
        if self.worker_thread_count == 0 || self.worker_thread_count > MAX_WORKER_THREADS {
            return Err(DuatError::invalid(
                "worker_thread_count",
                format!("must be in 1..={MAX_WORKER_THREADS}"),
            ));
        }
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(DuatError::invalid("screen_width", "viewport must not be empty"));
        }
        if self.grid_cell_size == 0 {
            return Err(DuatError::invalid("grid_cell_size", "must be greater than zero"));
        }
        if self.profiler_history == 0 {
            return Err(DuatError::invalid("profiler_history", "must be greater than zero"));
        }
        for (field, secs) in [
            ("quality_eval_interval_secs", self.quality_eval_interval_secs),
            ("quality_stability_secs", self.quality_stability_secs),
            ("memory_check_interval_secs", self.memory_check_interval_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(DuatError::invalid(field, "must be finite and >= 0"));
            }
        }
        for (field, fraction) in [
            ("memory_warning_threshold", self.memory_warning_threshold),
            ("memory_critical_threshold", self.memory_critical_threshold),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(DuatError::invalid(field, "must be in (0, 1]"));
            }
        }
        if self.memory_warning_threshold >= self.memory_critical_threshold {
            return Err(DuatError::invalid(
                "memory_warning_threshold",
                "must be below memory_critical_threshold",
            ));
        }
        Ok(())
    }

    /// Cache budget in bytes (zero if the budget is invalid).
    #[must_use]
    pub fn cache_budget_bytes(&self) -> u64 {
        u64::try_from(self.cache_budget_mb).unwrap_or(0) * BYTES_PER_MB
    }

    /// `1000 / target_fps` milliseconds.
    #[inline]
    #[must_use]
    pub fn frame_budget_ms(&self) -> f32 {
        1000.0 / self.target_fps
    }
}
