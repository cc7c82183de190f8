//! Per-effect parameter tables.
//!
//! Every effect belongs to a spawn family (how particles start) and a render
//! style (how they are drawn). Both are closed enums so adding an effect is a
//! compile error until every table covers it.

use serde::{Deserialize, Serialize};

/// Particle effect kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Loose sand kicked up by movement.
    SandGrain,
    /// Streams of sand between two points.
    SandFlow,
    /// Impact burst on damage.
    CombatHit,
    /// Healing glitter.
    HealSparkle,
    /// Soft magical glow.
    MagicGlow,
    /// Ambient dust. Lowest render priority, dropped first.
    Atmospheric,
    /// Fire sparks (attack cards).
    FireSpark,
    /// Lightning (skill cards).
    LightningBolt,
    /// Rising golden aura (power cards).
    GoldenAura,
    /// Floating glyphs.
    MysticalRune,
    /// Trailing embers.
    EmberTrail,
    /// Charged orbs.
    EnergyOrb,
    /// Spiralling sand (status cards).
    SandSpiral,
}

impl EffectType {
    /// Number of effect kinds.
    pub const COUNT: usize = 13;

    /// All kinds, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::SandGrain,
        Self::SandFlow,
        Self::CombatHit,
        Self::HealSparkle,
        Self::MagicGlow,
        Self::Atmospheric,
        Self::FireSpark,
        Self::LightningBolt,
        Self::GoldenAura,
        Self::MysticalRune,
        Self::EmberTrail,
        Self::EnergyOrb,
        Self::SandSpiral,
    ];

    /// Dense index for per-kind arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SandGrain => "sand_grain",
            Self::SandFlow => "sand_flow",
            Self::CombatHit => "combat_hit",
            Self::HealSparkle => "heal_sparkle",
            Self::MagicGlow => "magic_glow",
            Self::Atmospheric => "atmospheric",
            Self::FireSpark => "fire_spark",
            Self::LightningBolt => "lightning_bolt",
            Self::GoldenAura => "golden_aura",
            Self::MysticalRune => "mystical_rune",
            Self::EmberTrail => "ember_trail",
            Self::EnergyOrb => "energy_orb",
            Self::SandSpiral => "sand_spiral",
        }
    }

    /// Rendering and budgeting profile.
    #[must_use]
    pub const fn profile(self) -> EffectProfile {
        let (render_priority, lod_distance, batch_size, bytes_per_particle) = match self {
            Self::SandGrain => (1, 300.0, 32, 48),
            Self::SandFlow => (2, 400.0, 24, 56),
            Self::CombatHit => (5, 200.0, 16, 64),
            Self::HealSparkle => (3, 300.0, 24, 64),
            Self::MagicGlow => (3, 300.0, 24, 64),
            Self::Atmospheric => (0, 500.0, 64, 40),
            Self::FireSpark => (4, 250.0, 20, 72),
            Self::LightningBolt => (6, 300.0, 12, 80),
            Self::GoldenAura => (3, 350.0, 28, 68),
            Self::MysticalRune => (4, 350.0, 16, 72),
            Self::EmberTrail => (4, 250.0, 20, 72),
            Self::EnergyOrb => (5, 300.0, 12, 80),
            Self::SandSpiral => (7, 400.0, 8, 96),
        };
        EffectProfile {
            render_priority,
            lod_distance,
            batch_size,
            bytes_per_particle,
        }
    }

    /// How particles of this kind are initialized.
    #[must_use]
    pub const fn family(self) -> SpawnFamily {
        match self {
            Self::SandGrain | Self::SandFlow => SpawnFamily::Sand,
            Self::FireSpark | Self::EmberTrail => SpawnFamily::Fire,
            Self::LightningBolt | Self::EnergyOrb => SpawnFamily::Lightning,
            Self::GoldenAura | Self::HealSparkle => SpawnFamily::Aura,
            Self::CombatHit
            | Self::MagicGlow
            | Self::Atmospheric
            | Self::MysticalRune
            | Self::SandSpiral => SpawnFamily::Generic,
        }
    }

    /// How particles of this kind are drawn.
    #[must_use]
    pub const fn render_style(self) -> RenderStyle {
        match self.family() {
            SpawnFamily::Sand | SpawnFamily::Generic => RenderStyle::Disc,
            SpawnFamily::Fire => RenderStyle::Glow,
            SpawnFamily::Lightning => RenderStyle::Bolt,
            SpawnFamily::Aura => RenderStyle::Rings,
        }
    }

    /// Kinds sorted by descending render priority. Ties keep declaration order.
    #[must_use]
    pub fn render_order() -> [Self; Self::COUNT] {
        let mut order = Self::ALL;
        order.sort_by_key(|kind| std::cmp::Reverse(kind.profile().render_priority));
        order
    }
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering and budgeting profile of an effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectProfile {
    /// Higher draws first.
    pub render_priority: u8,
    /// Distance from the view centre beyond which particles shrink.
    pub lod_distance: f32,
    /// Preferred batch size for a batching backend.
    pub batch_size: u16,
    /// Estimated footprint per live particle.
    pub bytes_per_particle: u32,
}

/// Initialization families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnFamily {
    /// Warm sand tones, heavy fall.
    Sand,
    /// Orange sparks, medium fall.
    Fire,
    /// Fast blue streaks, no gravity.
    Lightning,
    /// Slow golden motes drifting upward with fades.
    Aura,
    /// White, light fall.
    Generic,
}

impl SpawnFamily {
    /// Spawn parameter ranges.
    #[must_use]
    pub const fn params(self) -> SpawnParams {
        match self {
            Self::Sand => SpawnParams {
                speed: (20.0, 80.0),
                jitter: 5.0,
                size: (1.0, 3.0),
                life: (0.5, 1.5),
                red: (200, 255),
                green: (180, 220),
                blue: (0, 50),
                gravity: 30.0,
                upward: false,
                fade_in: 0.0,
                fade_out: 0.0,
            },
            Self::Fire => SpawnParams {
                speed: (30.0, 100.0),
                jitter: 8.0,
                size: (2.0, 5.0),
                life: (0.8, 1.5),
                red: (255, 255),
                green: (80, 150),
                blue: (20, 80),
                gravity: 20.0,
                upward: false,
                fade_in: 0.0,
                fade_out: 0.0,
            },
            Self::Lightning => SpawnParams {
                speed: (50.0, 120.0),
                jitter: 10.0,
                size: (1.0, 3.0),
                life: (0.5, 1.0),
                red: (80, 150),
                green: (120, 200),
                blue: (255, 255),
                gravity: 0.0,
                upward: false,
                fade_in: 0.0,
                fade_out: 0.0,
            },
            Self::Aura => SpawnParams {
                speed: (10.0, 40.0),
                jitter: 5.0,
                size: (2.0, 4.0),
                life: (1.5, 2.5),
                red: (255, 255),
                green: (180, 255),
                blue: (0, 0),
                gravity: -5.0,
                upward: true,
                fade_in: 0.2,
                fade_out: 0.5,
            },
            Self::Generic => SpawnParams {
                speed: (20.0, 60.0),
                jitter: 5.0,
                size: (1.0, 3.0),
                life: (1.0, 2.0),
                red: (255, 255),
                green: (255, 255),
                blue: (255, 255),
                gravity: 10.0,
                upward: false,
                fade_in: 0.0,
                fade_out: 0.0,
            },
        }
    }
}

/// Inclusive ranges a particle is drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnParams {
    /// Speed before intensity scaling (px/s).
    pub speed: (f32, f32),
    /// Spawn position jitter (px, each axis).
    pub jitter: f32,
    /// Radius (px).
    pub size: (f32, f32),
    /// Lifetime (s).
    pub life: (f32, f32),
    /// Red channel range.
    pub red: (u8, u8),
    /// Green channel range.
    pub green: (u8, u8),
    /// Blue channel range.
    pub blue: (u8, u8),
    /// Vertical acceleration (px/s², positive falls).
    pub gravity: f32,
    /// Launch angles restricted to the upper half-plane.
    pub upward: bool,
    /// Fade-in window (s), 0 for none.
    pub fade_in: f32,
    /// Fade-out window (s), 0 for none.
    pub fade_out: f32,
}

/// Draw styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStyle {
    /// One filled disc.
    Disc,
    /// Brightened halo disc under a core disc.
    Glow,
    /// Four-point zig-zag polyline.
    Bolt,
    /// Three concentric rings.
    Rings,
}

/// Card categories mapped to card effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Attack cards.
    Attack,
    /// Skill cards.
    Skill,
    /// Power cards.
    Power,
    /// Status cards.
    Status,
    /// Anything else.
    Other,
}

impl CardKind {
    /// Effect and base particle count for a card of this kind.
    #[must_use]
    pub const fn effect(self) -> (EffectType, usize) {
        match self {
            Self::Attack | Self::Other => (EffectType::FireSpark, 10),
            Self::Skill => (EffectType::LightningBolt, 10),
            Self::Power => (EffectType::GoldenAura, 15),
            Self::Status => (EffectType::SandSpiral, 10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all() {
        for (i, kind) in EffectType::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_render_order_is_descending() {
        let order = EffectType::render_order();
        assert_eq!(order[0], EffectType::SandSpiral);
        assert_eq!(order[EffectType::COUNT - 1], EffectType::Atmospheric);
        for pair in order.windows(2) {
            assert!(pair[0].profile().render_priority >= pair[1].profile().render_priority);
        }
    }

    #[test]
    fn test_only_aura_family_fades() {
        for kind in EffectType::ALL {
            let params = kind.family().params();
            let fades = params.fade_in > 0.0 || params.fade_out > 0.0;
            assert_eq!(fades, kind.family() == SpawnFamily::Aura, "{kind}");
            assert!(params.life.0 <= params.life.1);
        }
    }

    #[test]
    fn test_card_effects() {
        assert_eq!(CardKind::Power.effect(), (EffectType::GoldenAura, 15));
        assert_eq!(CardKind::Other.effect().0, EffectType::FireSpark);
        assert_eq!(EffectType::LightningBolt.render_style(), RenderStyle::Bolt);
    }
}
