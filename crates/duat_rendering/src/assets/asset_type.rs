//! Closed set of asset kinds and their processing rules.

use duat_core::{MemoryPriority, MemoryType};
use duat_shared::QualityLevel;
use serde::{Deserialize, Serialize};

use super::surface::Surface;

/// Load priority. Higher loads first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPriority {
    /// Speculative, for screens not yet shown.
    Preload,
    /// Nice to have.
    Low,
    /// Default.
    Medium,
    /// Visible soon.
    High,
    /// Visible now.
    Critical,
}

impl LoadPriority {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preload => "preload",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Asset kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Generic texture.
    Texture,
    /// Character or object sprite.
    Sprite,
    /// Full-screen background.
    Background,
    /// Card illustration.
    CardArt,
    /// Interface chrome.
    Ui,
    /// Glyph atlas.
    Font,
    /// Particle sprite sheet.
    ParticleSheet,
}

impl AssetType {
    /// All kinds.
    pub const ALL: [Self; 7] = [
        Self::Texture,
        Self::Sprite,
        Self::Background,
        Self::CardArt,
        Self::Ui,
        Self::Font,
        Self::ParticleSheet,
    ];

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Sprite => "sprite",
            Self::Background => "background",
            Self::CardArt => "card_art",
            Self::Ui => "ui",
            Self::Font => "font",
            Self::ParticleSheet => "particle_sheet",
        }
    }

    /// Resolution scale applied when loading at `level`.
    #[must_use]
    pub fn texture_scale(self, level: QualityLevel) -> f32 {
        let tier = match level {
            QualityLevel::Ultra => 1.0,
            QualityLevel::High => 0.9,
            QualityLevel::Medium => 0.75,
            QualityLevel::Low => 0.6,
            QualityLevel::Minimal => 0.5,
        };
        match self {
            Self::Ui | Self::Font => 1.0,
            Self::CardArt => f32::max(tier, 0.75),
            Self::Texture | Self::Sprite | Self::Background | Self::ParticleSheet => tier,
        }
    }

    /// Priority used when a caller does not pick one.
    #[must_use]
    pub const fn default_priority(self) -> LoadPriority {
        match self {
            Self::Ui | Self::Font => LoadPriority::Critical,
            Self::Background => LoadPriority::High,
            Self::CardArt | Self::Sprite => LoadPriority::Medium,
            Self::Texture | Self::ParticleSheet => LoadPriority::Low,
        }
    }

    /// Cache entries of this kind start protected.
    #[must_use]
    pub const fn protected_by_default(self) -> bool {
        matches!(self, Self::Ui | Self::Font)
    }

    /// Allocation class for memory tracking.
    #[must_use]
    pub const fn memory_type(self) -> MemoryType {
        match self {
            Self::Font => MemoryType::Font,
            Self::Background | Self::Ui => MemoryType::Surface,
            Self::Texture | Self::Sprite | Self::CardArt | Self::ParticleSheet => MemoryType::Texture,
        }
    }

    /// Allocation priority for memory tracking.
    #[must_use]
    pub const fn memory_priority(self) -> MemoryPriority {
        match self {
            Self::Ui | Self::Font => MemoryPriority::Critical,
            Self::Background => MemoryPriority::High,
            Self::CardArt | Self::Sprite => MemoryPriority::Medium,
            Self::Texture | Self::ParticleSheet => MemoryPriority::Low,
        }
    }

    /// Per-kind processing after decode: downscale for the tier.
    #[must_use]
    pub fn process(self, surface: Surface, level: QualityLevel) -> Surface {
        let scale = self.texture_scale(level);
        if scale >= 1.0 {
            surface
        } else {
            surface.scaled(scale)
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
