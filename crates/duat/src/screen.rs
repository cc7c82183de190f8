//! Game screens and their performance targets.

use std::fmt;
use std::str::FromStr;

use duat_shared::{DuatError, QualityLevel};
use serde::{Deserialize, Serialize};

/// Screens the game moves between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
    /// Main menu.
    Menu,
    /// Card combat.
    Combat,
    /// Deck building.
    DeckBuilder,
    /// World map.
    Map,
    /// Progression and unlocks.
    Progression,
}

/// What a screen asks of the resource manager.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceTarget {
    /// Frame rate to hold.
    pub target_fps: f32,
    /// Upper bound on the asset cache while the screen is active (MB).
    pub memory_budget_mb: u64,
    /// Tier the screen is designed for.
    pub preferred_quality: QualityLevel,
}

impl ScreenType {
    /// Every screen.
    pub const ALL: [Self; 5] = [
        Self::Menu,
        Self::Combat,
        Self::DeckBuilder,
        Self::Map,
        Self::Progression,
    ];

    /// Stable name, also the tag on screen-scoped assets.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Combat => "combat",
            Self::DeckBuilder => "deck_builder",
            Self::Map => "map",
            Self::Progression => "progression",
        }
    }

    /// The screen's target.
    #[must_use]
    pub const fn target(self) -> PerformanceTarget {
        let (memory_budget_mb, preferred_quality) = match self {
            Self::Menu => (256, QualityLevel::High),
            Self::Combat => (512, QualityLevel::High),
            Self::DeckBuilder => (384, QualityLevel::High),
            Self::Map => (300, QualityLevel::Medium),
            Self::Progression => (256, QualityLevel::Medium),
        };
        PerformanceTarget {
            target_fps: 60.0,
            memory_budget_mb,
            preferred_quality,
        }
    }
}

impl fmt::Display for ScreenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScreenType {
    type Err = DuatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|screen| screen.as_str() == s)
            .ok_or_else(|| DuatError::Parse(format!("unknown screen '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(ScreenType::Combat.target().memory_budget_mb, 512);
        assert_eq!(ScreenType::Map.target().preferred_quality, QualityLevel::Medium);
        assert!(ScreenType::ALL.iter().all(|s| s.target().target_fps == 60.0));
    }

    #[test]
    fn test_name_round_trip() {
        for screen in ScreenType::ALL {
            assert_eq!(screen.as_str().parse::<ScreenType>(), Ok(screen));
        }
        assert!("credits".parse::<ScreenType>().is_err());
    }
}
