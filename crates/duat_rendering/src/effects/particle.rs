//! A single pooled particle.

use duat_shared::Vec2;

use super::effect_table::EffectType;

/// Alpha below which a particle is not drawn.
pub const VISIBILITY_THRESHOLD: u8 = 10;

/// One particle. Lives in a pool slot; a free slot holds no particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position (px).
    pub position: Vec2,
    /// Velocity (px/s).
    pub velocity: Vec2,
    /// Radius (px).
    pub size: f32,
    /// Remaining life (s). Never above `max_life`.
    pub life: f32,
    /// Life at spawn (s).
    pub max_life: f32,
    /// Base color.
    pub color: [u8; 3],
    /// Current alpha, derived from life.
    pub alpha: u8,
    /// Vertical acceleration (px/s²).
    pub gravity: f32,
    /// Life drained per second of simulation.
    pub fade_rate: f32,
    /// Effect this particle belongs to.
    pub kind: EffectType,
    /// Fade-in window (s), 0 for none.
    pub fade_in: f32,
    /// Fade-out window (s), 0 for none.
    pub fade_out: f32,
}

impl Particle {
    /// Creates a particle at full life.
    #[must_use]
    pub fn new(kind: EffectType, position: Vec2, velocity: Vec2, size: f32, life: f32, color: [u8; 3]) -> Self {
        let life = life.max(f32::EPSILON);
        let mut particle = Self {
            position,
            velocity,
            size,
            life,
            max_life: life,
            color,
            alpha: 0,
            gravity: 0.0,
            fade_rate: 1.0,
            kind,
            fade_in: 0.0,
            fade_out: 0.0,
        };
        particle.alpha = particle.compute_alpha();
        particle
    }

    /// Sets gravity.
    #[must_use]
    pub const fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Sets fade windows and recomputes alpha.
    #[must_use]
    pub fn with_fades(mut self, fade_in: f32, fade_out: f32) -> Self {
        self.fade_in = fade_in.max(0.0);
        self.fade_out = fade_out.max(0.0);
        self.alpha = self.compute_alpha();
        self
    }

    /// Advances one step. Returns `false` once life is spent.
    #[inline]
    pub fn update(&mut self, dt: f32) -> bool {
        self.position.x += self.velocity.x * dt;
        self.position.y += self.velocity.y * dt;
        self.velocity.y += self.gravity * dt;
        self.life = (self.life - dt * self.fade_rate).min(self.max_life);

        if self.life <= 0.0 {
            self.life = 0.0;
            self.alpha = 0;
            return false;
        }

        self.alpha = self.compute_alpha();
        true
    }

    /// Alpha for the current life.
    ///
    /// Linear in the life ratio, unless fade windows are set: then it ramps
    /// up across the fade-in window, down across the fade-out window, and is
    /// opaque in between.
    #[must_use]
    pub fn compute_alpha(&self) -> u8 {
        let factor = if self.fade_in <= 0.0 && self.fade_out <= 0.0 {
            self.life / self.max_life
        } else {
            let age = self.max_life - self.life;
            let mut factor: f32 = 1.0;
            if self.fade_in > 0.0 && age < self.fade_in {
                factor = factor.min(age / self.fade_in);
            }
            if self.fade_out > 0.0 && self.life < self.fade_out {
                factor = factor.min(self.life / self.fade_out);
            }
            factor
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let alpha = (255.0 * factor.clamp(0.0, 1.0)) as u8;
        alpha
    }

    /// Seconds since spawn.
    #[inline]
    #[must_use]
    pub fn age(&self) -> f32 {
        self.max_life - self.life
    }

    /// Drawn at all?
    #[inline]
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.alpha >= VISIBILITY_THRESHOLD
    }

    /// Color with the current alpha.
    #[inline]
    #[must_use]
    pub const fn rgba(&self) -> [u8; 4] {
        [self.color[0], self.color[1], self.color[2], self.alpha]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spark(life: f32) -> Particle {
        Particle::new(
            EffectType::FireSpark,
            Vec2::new(10.0, 10.0),
            Vec2::new(100.0, 0.0),
            2.0,
            life,
            [255, 120, 40],
        )
    }

    #[test]
    fn test_linear_alpha() {
        let mut p = spark(1.0);
        assert_eq!(p.alpha, 255);
        assert!(p.update(0.5));
        assert!((i32::from(p.alpha) - 127).abs() <= 1);
        assert!((p.position.x - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_dies_at_zero_life() {
        let mut p = spark(0.1);
        assert!(!p.update(0.2));
        assert_eq!(p.alpha, 0);
        assert_eq!(p.life, 0.0);
    }

    #[test]
    fn test_gravity_accelerates_downward() {
        let mut p = spark(2.0).with_gravity(30.0);
        p.update(1.0);
        assert!((p.velocity.y - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_fade_windows() {
        let mut p = spark(2.0).with_fades(0.2, 0.5);
        assert_eq!(p.alpha, 0, "fade-in starts transparent");

        p.update(0.1);
        assert!((i32::from(p.alpha) - 127).abs() <= 1);

        p.update(0.5);
        assert_eq!(p.alpha, 255, "steady middle is opaque");

        p.update(1.35);
        assert!(p.alpha > 0 && p.alpha < 40, "fading out near the end");
    }

    #[test]
    fn test_life_never_exceeds_max() {
        let mut p = spark(1.0);
        p.fade_rate = -1.0;
        p.update(0.5);
        assert!(p.life <= p.max_life);
    }
}
