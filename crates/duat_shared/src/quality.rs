//! # Quality Tiers
//!
//! Five ordered presets trading visual fidelity for frame budget.
//!
//! ```text
//!   Ultra ──► High ──► Medium ──► Low ──► Minimal
//!   (step_down)                        (step_up ◄──)
//! ```
//!
//! A preset is immutable. Custom settings are produced by layering
//! [`QualityOverrides`] on top of a preset, never by mutating one.

use crate::constants::BYTES_PER_MB;
use crate::error::{DuatError, DuatResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete quality tier, ordered from richest to cheapest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum QualityLevel {
    /// Everything on
    Ultra = 0,
    /// Default for capable machines
    High = 1,
    /// Compression on, post-processing off
    Medium = 2,
    /// Effects off
    Low = 3,
    /// Bare minimum, 30 FPS target
    Minimal = 4,
}

impl QualityLevel {
    /// All tiers, richest first.
    pub const ALL: [Self; 5] = [Self::Ultra, Self::High, Self::Medium, Self::Low, Self::Minimal];

    /// One tier cheaper, or `None` at Minimal.
    #[inline]
    #[must_use]
    pub const fn step_down(self) -> Option<Self> {
        match self {
            Self::Ultra => Some(Self::High),
            Self::High => Some(Self::Medium),
            Self::Medium => Some(Self::Low),
            Self::Low => Some(Self::Minimal),
            Self::Minimal => None,
        }
    }

    /// One tier richer, or `None` at Ultra.
    #[inline]
    #[must_use]
    pub const fn step_up(self) -> Option<Self> {
        match self {
            Self::Ultra => None,
            Self::High => Some(Self::Ultra),
            Self::Medium => Some(Self::High),
            Self::Low => Some(Self::Medium),
            Self::Minimal => Some(Self::Low),
        }
    }

    /// Lowercase name used in preference records and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ultra => "ultra",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
        }
    }

    /// The immutable preset for this tier.
    #[inline]
    #[must_use]
    pub const fn settings(self) -> QualitySettings {
        QualitySettings::preset(self)
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = DuatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ultra" => Ok(Self::Ultra),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "minimal" => Ok(Self::Minimal),
            other => Err(DuatError::invalid("quality_level", format!("unknown tier '{other}'"))),
        }
    }
}

/// Coarse detail knob for lighting and shadows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Cheapest
    Low,
    /// Balanced
    Medium,
    /// Full detail
    High,
}

/// Concrete parameters derived from a tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Particle-count cap
    pub max_particles: usize,
    /// Spawn count multiplier
    pub particle_multiplier: f32,
    /// Distance (px) beyond which particles render at reduced detail
    pub particle_lod_distance: f32,
    /// Texture resolution scale in (0, 1]
    pub texture_scale: f32,
    /// Store textures compressed
    pub asset_compression: bool,
    /// Mipmap levels generated per texture
    pub mipmap_levels: u8,
    /// Lighting detail
    pub lighting_quality: DetailLevel,
    /// Shadow detail
    pub shadow_quality: DetailLevel,
    /// Parallax background layers
    pub parallax_layers: u8,
    /// Post-processing pass
    pub post_processing: bool,
    /// Informational frame-rate target of the tier
    pub target_fps: f32,
    /// Draw-call cap per frame
    pub max_draw_calls: u32,
    /// Asset memory budget in megabytes
    pub memory_budget_mb: u64,
    /// Heat shimmer distortion
    pub heat_shimmer: bool,
    /// Ambient atmospheric particles
    pub atmospheric_particles: bool,
    /// Dynamic lights
    pub dynamic_lighting: bool,
    /// Full-screen effects (flashes, shakes)
    pub screen_effects: bool,
}

impl QualitySettings {
    /// The preset table.
    #[must_use]
    pub const fn preset(level: QualityLevel) -> Self {
        match level {
            QualityLevel::Ultra => Self {
                max_particles: 3000,
                particle_multiplier: 1.0,
                particle_lod_distance: 1000.0,
                texture_scale: 1.0,
                asset_compression: false,
                mipmap_levels: 4,
                lighting_quality: DetailLevel::High,
                shadow_quality: DetailLevel::High,
                parallax_layers: 5,
                post_processing: true,
                target_fps: 60.0,
                max_draw_calls: 1000,
                memory_budget_mb: 1024,
                heat_shimmer: true,
                atmospheric_particles: true,
                dynamic_lighting: true,
                screen_effects: true,
            },
            QualityLevel::High => Self {
                max_particles: 2000,
                particle_multiplier: 0.8,
                particle_lod_distance: 800.0,
                texture_scale: 1.0,
                asset_compression: false,
                mipmap_levels: 3,
                lighting_quality: DetailLevel::High,
                shadow_quality: DetailLevel::Medium,
                parallax_layers: 4,
                post_processing: true,
                target_fps: 60.0,
                max_draw_calls: 800,
                memory_budget_mb: 512,
                heat_shimmer: true,
                atmospheric_particles: true,
                dynamic_lighting: true,
                screen_effects: true,
            },
            QualityLevel::Medium => Self {
                max_particles: 1200,
                particle_multiplier: 0.6,
                particle_lod_distance: 600.0,
                texture_scale: 0.8,
                asset_compression: true,
                mipmap_levels: 2,
                lighting_quality: DetailLevel::Medium,
                shadow_quality: DetailLevel::Medium,
                parallax_layers: 3,
                post_processing: false,
                target_fps: 60.0,
                max_draw_calls: 600,
                memory_budget_mb: 384,
                heat_shimmer: true,
                atmospheric_particles: false,
                dynamic_lighting: true,
                screen_effects: false,
            },
            QualityLevel::Low => Self {
                max_particles: 600,
                particle_multiplier: 0.4,
                particle_lod_distance: 400.0,
                texture_scale: 0.6,
                asset_compression: true,
                mipmap_levels: 1,
                lighting_quality: DetailLevel::Low,
                shadow_quality: DetailLevel::Low,
                parallax_layers: 2,
                post_processing: false,
                target_fps: 60.0,
                max_draw_calls: 400,
                memory_budget_mb: 256,
                heat_shimmer: false,
                atmospheric_particles: false,
                dynamic_lighting: false,
                screen_effects: false,
            },
            QualityLevel::Minimal => Self {
                max_particles: 300,
                particle_multiplier: 0.2,
                particle_lod_distance: 200.0,
                texture_scale: 0.4,
                asset_compression: true,
                mipmap_levels: 1,
                lighting_quality: DetailLevel::Low,
                shadow_quality: DetailLevel::Low,
                parallax_layers: 1,
                post_processing: false,
                target_fps: 30.0,
                max_draw_calls: 200,
                memory_budget_mb: 128,
                heat_shimmer: false,
                atmospheric_particles: false,
                dynamic_lighting: false,
                screen_effects: false,
            },
        }
    }

    /// Memory budget in bytes.
    #[inline]
    #[must_use]
    pub const fn memory_budget_bytes(&self) -> u64 {
        self.memory_budget_mb * BYTES_PER_MB
    }

    /// Are shadows drawn at all?
    #[inline]
    #[must_use]
    pub fn shadows_enabled(&self) -> bool {
        self.shadow_quality != DetailLevel::Low
    }

    /// Checks that every numeric field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DuatError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> DuatResult<()> {
        if !self.particle_multiplier.is_finite() || self.particle_multiplier < 0.0 {
            return Err(DuatError::invalid("particle_multiplier", "must be finite and >= 0"));
        }
        if !self.particle_lod_distance.is_finite() || self.particle_lod_distance <= 0.0 {
            return Err(DuatError::invalid("particle_lod_distance", "must be finite and > 0"));
        }
        if !(self.texture_scale > 0.0 && self.texture_scale <= 1.0) {
            return Err(DuatError::invalid("texture_scale", "must be in (0, 1]"));
        }
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(DuatError::invalid("target_fps", "must be finite and > 0"));
        }
        if self.memory_budget_mb == 0 {
            return Err(DuatError::invalid("memory_budget_mb", "must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::preset(QualityLevel::High)
    }
}

/// Partial settings layered over a preset.
///
/// Every `None` keeps the preset's value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityOverrides {
    /// Particle-count cap
    pub max_particles: Option<usize>,
    /// Spawn count multiplier
    pub particle_multiplier: Option<f32>,
    /// LOD distance
    pub particle_lod_distance: Option<f32>,
    /// Texture resolution scale
    pub texture_scale: Option<f32>,
    /// Post-processing pass
    pub post_processing: Option<bool>,
    /// Ambient atmospheric particles
    pub atmospheric_particles: Option<bool>,
    /// Shadow detail
    pub shadow_quality: Option<DetailLevel>,
    /// Asset memory budget in megabytes
    pub memory_budget_mb: Option<u64>,
}

impl QualityOverrides {
    /// Are all fields unset?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layers these overrides over `base`.
    #[must_use]
    pub fn apply(&self, base: QualitySettings) -> QualitySettings {
        QualitySettings {
            max_particles: self.max_particles.unwrap_or(base.max_particles),
            particle_multiplier: self.particle_multiplier.unwrap_or(base.particle_multiplier),
            particle_lod_distance: self.particle_lod_distance.unwrap_or(base.particle_lod_distance),
            texture_scale: self.texture_scale.unwrap_or(base.texture_scale),
            post_processing: self.post_processing.unwrap_or(base.post_processing),
            atmospheric_particles: self
                .atmospheric_particles
                .unwrap_or(base.atmospheric_particles),
            shadow_quality: self.shadow_quality.unwrap_or(base.shadow_quality),
            memory_budget_mb: self.memory_budget_mb.unwrap_or(base.memory_budget_mb),
            ..base
        }
    }

    /// Builds a validated custom preset from `base`.
    ///
    /// # Errors
    ///
    /// Returns [`DuatError::InvalidConfig`] if the result is unusable.
    pub fn create_custom_preset(&self, base: QualityLevel) -> DuatResult<QualitySettings> {
        let settings = self.apply(base.settings());
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_stepping_is_bounded() {
        assert_eq!(QualityLevel::Ultra.step_up(), None);
        assert_eq!(QualityLevel::Minimal.step_down(), None);
        assert_eq!(QualityLevel::High.step_down(), Some(QualityLevel::Medium));
        assert_eq!(QualityLevel::Low.step_up(), Some(QualityLevel::Medium));
    }

    #[test]
    fn test_presets_are_monotonic() {
        for pair in QualityLevel::ALL.windows(2) {
            let richer = pair[0].settings();
            let cheaper = pair[1].settings();
            assert!(richer.max_particles > cheaper.max_particles);
            assert!(richer.particle_multiplier > cheaper.particle_multiplier);
            assert!(richer.memory_budget_mb > cheaper.memory_budget_mb);
            assert!(richer.texture_scale >= cheaper.texture_scale);
        }
    }

    #[test]
    fn test_every_preset_validates() {
        for level in QualityLevel::ALL {
            assert!(level.settings().validate().is_ok(), "{level} preset invalid");
        }
    }

    #[test]
    fn test_level_parse_round_trip() {
        for level in QualityLevel::ALL {
            assert_eq!(level.as_str().parse::<QualityLevel>().unwrap(), level);
        }
        assert!("cinematic".parse::<QualityLevel>().is_err());
    }

    #[test]
    fn test_overrides_layer_over_preset() {
        let overrides = QualityOverrides {
            max_particles: Some(900),
            post_processing: Some(true),
            ..Default::default()
        };
        let custom = overrides.create_custom_preset(QualityLevel::Low).unwrap();
        assert_eq!(custom.max_particles, 900);
        assert!(custom.post_processing);
        assert_eq!(custom.parallax_layers, QualityLevel::Low.settings().parallax_layers);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = QualityOverrides {
            texture_scale: Some(1.5),
            ..Default::default()
        };
        assert!(overrides.create_custom_preset(QualityLevel::High).is_err());
    }
}
