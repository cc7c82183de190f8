//! The particle engine.
//!
//! Owns a [`ParticlePool`] and a [`SpatialGrid`]. Per frame:
//!
//! ```text
//! spawn(..)*  →  update(dt)  →  render(target, camera)
//!                 │               │
//!                 │               └─ grid query → alpha filter → batches by
//!                 │                  effect → draw by descending priority
//!                 └─ integrate, expire into the pool, rebuild the grid
//! ```
//!
//! Spawning past the cap spawns fewer particles. Nothing here returns an error.

use std::f32::consts::{PI, TAU};
use std::time::Instant;

use duat_core::PoolHandle;
use duat_shared::constants::{DEFAULT_GRID_CELL_SIZE, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use duat_shared::{QualityLevel, QualitySettings, Rect, ResourceConfig, Vec2, DEFAULT_MAX_PARTICLES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::effect_table::{CardKind, EffectType, RenderStyle};
use super::grid::SpatialGrid;
use super::particle::Particle;
use super::pool::ParticlePool;
use crate::target::RenderTarget;

/// Size factor for particles beyond their LOD distance.
pub const LOD_SIZE_FACTOR: f32 = 0.5;

/// Default RNG seed.
pub const DEFAULT_PARTICLE_SEED: u64 = 0x5A4D_D0A7;

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleEngineConfig {
    /// Pool capacity, the hard particle limit.
    pub capacity: usize,
    /// Viewport width covered by the grid.
    pub screen_width: u32,
    /// Viewport height covered by the grid.
    pub screen_height: u32,
    /// Grid cell edge (px).
    pub cell_size: u32,
    /// RNG seed.
    pub seed: u64,
}

impl Default for ParticleEngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAX_PARTICLES,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            cell_size: DEFAULT_GRID_CELL_SIZE,
            seed: DEFAULT_PARTICLE_SEED,
        }
    }
}

impl ParticleEngineConfig {
    /// Derives the engine parameters from a validated configuration.
    #[must_use]
    pub fn from_resource(config: &ResourceConfig) -> Self {
        Self {
            capacity: config.max_particles,
            screen_width: config.screen_width,
            screen_height: config.screen_height,
            cell_size: config.grid_cell_size,
            seed: config.particle_seed,
        }
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleStats {
    /// Live particles.
    pub active: u32,
    /// Pool capacity.
    pub capacity: u32,
    /// Current spawn cap.
    pub cap: u32,
    /// Particles spawned, lifetime.
    pub created: u64,
    /// Particles returned to the pool, lifetime.
    pub released: u64,
    /// Requested particles not spawned because of the cap, lifetime.
    pub spawn_shortfall: u64,
    /// Particles outside the view, last render.
    pub culled: u32,
    /// Particles too transparent to draw, last render.
    pub transparent: u32,
    /// Particles drawn, last render.
    pub rendered: u32,
    /// Draw calls issued, last render.
    pub draw_calls: u32,
    /// Time spent in the last update (µs).
    pub update_us: u32,
    /// Time spent in the last render (µs).
    pub render_us: u32,
    /// Estimated footprint of live particles.
    pub estimated_memory_bytes: u64,
}

/// Pooled, grid-culled particle simulation.
pub struct ParticleEngine {
    pool: ParticlePool,
    grid: SpatialGrid,
    rng: ChaCha8Rng,
    quality: QualitySettings,
    cap: usize,
    screen_center: Vec2,
    render_order: [EffectType; EffectType::COUNT],
    /// Scratch: handles surviving the grid query.
    visible: Vec<PoolHandle>,
    /// Scratch: drawable handles per effect.
    batches: Vec<Vec<PoolHandle>>,
    spawn_shortfall: u64,
    last_culled: u32,
    last_transparent: u32,
    last_rendered: u32,
    last_draw_calls: u32,
    update_us: u32,
    render_us: u32,
    estimated_memory_bytes: u64,
}

impl ParticleEngine {
    /// Creates an engine at High quality.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` or `config.cell_size` is zero.
    #[must_use]
    pub fn new(config: ParticleEngineConfig) -> Self {
        let quality = QualityLevel::High.settings();
        #[allow(clippy::cast_precision_loss)]
        let screen_center = Vec2::new(
            config.screen_width as f32 / 2.0,
            config.screen_height as f32 / 2.0,
        );
        Self {
            pool: ParticlePool::new(config.capacity),
            grid: SpatialGrid::new(config.screen_width, config.screen_height, config.cell_size),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            quality,
            cap: config.capacity.min(quality.max_particles),
            screen_center,
            render_order: EffectType::render_order(),
            visible: Vec::with_capacity(config.capacity),
            batches: (0..EffectType::COUNT)
                .map(|_| Vec::with_capacity(config.capacity / 4))
                .collect(),
            spawn_shortfall: 0,
            last_culled: 0,
            last_transparent: 0,
            last_rendered: 0,
            last_draw_calls: 0,
            update_us: 0,
            render_us: 0,
            estimated_memory_bytes: 0,
        }
    }

    // =========================================================================
    // QUALITY
    // =========================================================================

    /// Adopts new quality parameters. Resets the spawn cap to the tier cap.
    ///
    /// Live particles are not culled; they expire naturally.
    pub fn apply_quality(&mut self, settings: &QualitySettings) {
        self.quality = *settings;
        self.cap = self.pool.capacity().min(settings.max_particles);
    }

    /// Quality parameters in effect.
    #[inline]
    #[must_use]
    pub const fn quality(&self) -> &QualitySettings {
        &self.quality
    }

    /// Sets the spawn cap, clamped to the pool and the tier cap.
    pub fn set_particle_cap(&mut self, cap: usize) {
        self.cap = cap.min(self.pool.capacity()).min(self.quality.max_particles);
    }

    /// Highest number of live particles spawning may reach.
    #[inline]
    #[must_use]
    pub const fn max_particles(&self) -> usize {
        self.cap
    }

    // =========================================================================
    // SPAWNING
    // =========================================================================

    /// Spawns a burst of `kind` at `(x, y)`. Returns how many were spawned.
    ///
    /// `count` is scaled by the tier's particle multiplier and by
    /// `intensity`, then clamped to the free room under the cap.
    pub fn spawn(&mut self, kind: EffectType, x: f32, y: f32, count: usize, intensity: f32) -> usize {
        if kind == EffectType::Atmospheric && !self.quality.atmospheric_particles {
            return 0;
        }
        let intensity = if intensity.is_finite() { intensity.max(0.0) } else { 0.0 };

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let requested = (count as f32 * self.quality.particle_multiplier * intensity).floor() as usize;
        let room = self.cap.saturating_sub(self.pool.in_use());
        let allowed = requested.min(room);

        let origin = Vec2::new(x, y);
        let mut spawned = 0;
        for _ in 0..allowed {
            let particle = Self::make_particle(&mut self.rng, kind, origin, intensity);
            if self.pool.acquire(particle).is_none() {
                break;
            }
            spawned += 1;
        }

        self.spawn_shortfall += (requested - spawned) as u64;
        if spawned < requested {
            tracing::debug!(effect = kind.as_str(), requested, spawned, "Particle spawn clamped");
        }
        spawned
    }

    fn make_particle(rng: &mut ChaCha8Rng, kind: EffectType, origin: Vec2, intensity: f32) -> Particle {
        let params = kind.family().params();
        let angle = if params.upward {
            rng.gen_range(PI..TAU)
        } else {
            rng.gen_range(0.0..TAU)
        };
        let speed = rng.gen_range(params.speed.0..=params.speed.1) * intensity;
        let jitter = params.jitter;
        let position = Vec2::new(
            origin.x + rng.gen_range(-jitter..=jitter),
            origin.y + rng.gen_range(-jitter..=jitter),
        );
        let color = [
            rng.gen_range(params.red.0..=params.red.1),
            rng.gen_range(params.green.0..=params.green.1),
            rng.gen_range(params.blue.0..=params.blue.1),
        ];

        Particle::new(
            kind,
            position,
            Vec2::new(angle.cos() * speed, angle.sin() * speed),
            rng.gen_range(params.size.0..=params.size.1),
            rng.gen_range(params.life.0..=params.life.1),
            color,
        )
        .with_gravity(params.gravity)
        .with_fades(params.fade_in, params.fade_out)
    }

    /// Impact burst scaled by damage.
    pub fn combat_hit(&mut self, x: f32, y: f32, damage: u32) -> usize {
        #[allow(clippy::cast_precision_loss)]
        let intensity = (damage as f32 / 10.0).min(2.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (10.0 * intensity) as usize;
        self.spawn(EffectType::CombatHit, x, y, count, intensity)
    }

    /// Sand stream burst.
    pub fn sand_flow(&mut self, x: f32, y: f32, intensity: f32) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (20.0 * intensity.max(0.0)) as usize;
        self.spawn(EffectType::SandFlow, x, y, count, intensity)
    }

    /// Effect for a played card.
    pub fn card_effect(&mut self, card: CardKind, x: f32, y: f32, intensity: f32) -> usize {
        let (kind, count) = card.effect();
        self.spawn(kind, x, y, count, intensity)
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Advances every particle by `dt` seconds.
    ///
    /// Expired particles return to the pool in the same pass; survivors are
    /// re-bucketed into the freshly cleared grid.
    pub fn update(&mut self, dt: f32) {
        let started = Instant::now();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.grid.clear();
        let grid = &mut self.grid;
        let mut memory = 0u64;
        self.pool.retain(|handle, particle| {
            let alive = particle.update(dt);
            if alive {
                grid.insert(handle, particle.position);
                memory += u64::from(particle.kind.profile().bytes_per_particle);
            }
            alive
        });

        self.estimated_memory_bytes = memory;
        self.update_us = elapsed_us(started);
    }

    /// Draws visible particles. Returns the draw calls issued.
    ///
    /// With a camera, only particles intersecting it are drawn; without one,
    /// every live particle is considered.
    pub fn render(&mut self, target: &mut dyn RenderTarget, camera: Option<Rect>) -> u32 {
        let started = Instant::now();

        self.visible.clear();
        for batch in &mut self.batches {
            batch.clear();
        }
        match camera {
            Some(view) => self.grid.query(view, &mut self.visible),
            None => self.visible.extend(self.pool.iter().map(|(handle, _)| handle)),
        }

        let mut transparent = 0u32;
        for &handle in &self.visible {
            let Some(particle) = self.pool.get(handle) else {
                continue;
            };
            if let Some(view) = camera {
                if !view.intersects_circle(particle.position, particle.size * 3.0) {
                    continue;
                }
            }
            if !particle.is_visible() {
                transparent += 1;
                continue;
            }
            self.batches[particle.kind.index()].push(handle);
        }

        let center = camera.map_or(self.screen_center, |view| view.center());
        let lod_scale = self.quality.particle_lod_distance / 1000.0;
        let mut draw_calls = 0u32;
        let mut rendered = 0u32;

        for kind in self.render_order {
            let batch = &self.batches[kind.index()];
            if batch.is_empty() {
                continue;
            }
            let lod = kind.profile().lod_distance * lod_scale;
            let lod_squared = lod * lod;
            let style = kind.render_style();

            for &handle in batch {
                let Some(particle) = self.pool.get(handle) else {
                    continue;
                };
                let reduced = particle.position.distance_squared(center) > lod_squared;
                draw_calls += draw_particle(target, particle, style, reduced);
                rendered += 1;
            }
        }

        let active = u32::try_from(self.pool.in_use()).unwrap_or(u32::MAX);
        self.last_culled = active.saturating_sub(rendered + transparent);
        self.last_transparent = transparent;
        self.last_rendered = rendered;
        self.last_draw_calls = draw_calls;
        self.render_us = elapsed_us(started);
        draw_calls
    }

    // =========================================================================
    // BULK OPERATIONS
    // =========================================================================

    /// Releases every particle.
    pub fn clear_all(&mut self) -> usize {
        self.grid.clear();
        self.estimated_memory_bytes = 0;
        self.pool.release_all()
    }

    /// Releases particles until at most `max` remain, lowest render priority
    /// first. Also lowers the spawn cap to `max`.
    pub fn cap_active(&mut self, max: usize) -> usize {
        self.set_particle_cap(max);
        let active = self.pool.in_use();
        if active <= max {
            return 0;
        }

        let mut victims: Vec<(u8, PoolHandle)> = self
            .pool
            .iter()
            .map(|(handle, particle)| (particle.kind.profile().render_priority, handle))
            .collect();
        victims.sort_unstable();

        let excess = active - max;
        for &(_, handle) in victims.iter().take(excess) {
            self.pool.release(handle);
        }
        self.rebuild_grid();
        excess
    }

    fn rebuild_grid(&mut self) {
        self.grid.clear();
        let mut memory = 0u64;
        for (handle, particle) in self.pool.iter() {
            self.grid.insert(handle, particle.position);
            memory += u64::from(particle.kind.profile().bytes_per_particle);
        }
        self.estimated_memory_bytes = memory;
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Live particles.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.pool.in_use()
    }

    /// Live particles per effect, indexed by [`EffectType::index`].
    #[must_use]
    pub fn count_by_type(&self) -> [usize; EffectType::COUNT] {
        let mut counts = [0; EffectType::COUNT];
        for (_, particle) in self.pool.iter() {
            counts[particle.kind.index()] += 1;
        }
        counts
    }

    /// Live particles.
    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.pool.iter().map(|(_, particle)| particle)
    }

    /// The pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// The grid as of the last update.
    #[inline]
    #[must_use]
    pub const fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> ParticleStats {
        let pool = self.pool.stats();
        ParticleStats {
            active: u32::try_from(self.pool.in_use()).unwrap_or(u32::MAX),
            capacity: u32::try_from(self.pool.capacity()).unwrap_or(u32::MAX),
            cap: u32::try_from(self.cap).unwrap_or(u32::MAX),
            created: pool.acquired,
            released: pool.released,
            spawn_shortfall: self.spawn_shortfall,
            culled: self.last_culled,
            transparent: self.last_transparent,
            rendered: self.last_rendered,
            draw_calls: self.last_draw_calls,
            update_us: self.update_us,
            render_us: self.render_us,
            estimated_memory_bytes: self.estimated_memory_bytes,
        }
    }
}

impl Default for ParticleEngine {
    fn default() -> Self {
        Self::new(ParticleEngineConfig::default())
    }
}

impl std::fmt::Debug for ParticleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleEngine")
            .field("pool", &self.pool)
            .field("cap", &self.cap)
            .finish_non_exhaustive()
    }
}

fn elapsed_us(started: Instant) -> u32 {
    u32::try_from(started.elapsed().as_micros()).unwrap_or(u32::MAX)
}

fn brighten(color: [u8; 3], amount: u8, alpha: u8) -> [u8; 4] {
    [
        color[0].saturating_add(amount),
        color[1].saturating_add(amount),
        color[2].saturating_add(amount),
        alpha,
    ]
}

/// Draws one particle. Returns the draw calls issued.
fn draw_particle(target: &mut dyn RenderTarget, particle: &Particle, style: RenderStyle, reduced: bool) -> u32 {
    let size = if reduced {
        particle.size * LOD_SIZE_FACTOR
    } else {
        particle.size
    };
    let center = particle.position;
    let color = particle.rgba();

    match style {
        RenderStyle::Disc => {
            target.draw_circle(center, size.max(1.0), color, 0);
            1
        }
        RenderStyle::Glow => {
            let radius = size.max(1.0);
            target.draw_circle(center, radius + 1.0, brighten(particle.color, 30, particle.alpha), 0);
            target.draw_circle(center, radius, color, 0);
            2
        }
        RenderStyle::Bolt => {
            let s = size * 3.0;
            let points = [
                Vec2::new(center.x, center.y - s),
                Vec2::new(center.x + s / 3.0, center.y - s / 2.0),
                Vec2::new(center.x - s / 3.0, center.y),
                Vec2::new(center.x + s / 2.0, center.y + s / 2.0),
            ];
            target.draw_polyline(&points, color, 2);
            1
        }
        RenderStyle::Rings => {
            let base = size * 2.0;
            let mut calls = 0;
            for ring in 0..3u8 {
                let radius = base - f32::from(ring) * 2.0;
                let alpha = particle.alpha.saturating_sub(ring * 30);
                if radius <= 0.0 || alpha == 0 {
                    continue;
                }
                target.draw_circle(center, radius, brighten(particle.color, ring * 20, alpha), 1);
                calls += 1;
            }
            calls
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::HeadlessTarget;

    fn engine(capacity: usize) -> ParticleEngine {
        let mut engine = ParticleEngine::new(ParticleEngineConfig {
            capacity,
            screen_width: 1024,
            screen_height: 768,
            cell_size: 64,
            seed: 7,
        });
        engine.apply_quality(&QualityLevel::Ultra.settings());
        engine
    }

    #[test]
    fn test_spawn_scales_by_multiplier() {
        let mut engine = engine(1000);
        engine.apply_quality(&QualityLevel::Medium.settings());
        assert_eq!(engine.spawn(EffectType::SandGrain, 100.0, 100.0, 50, 1.0), 30);
        assert_eq!(engine.spawn(EffectType::SandGrain, 100.0, 100.0, 50, 0.0), 0);
        assert_eq!(engine.spawn(EffectType::SandGrain, 100.0, 100.0, 50, f32::NAN), 0);
    }

    #[test]
    fn test_spawn_respects_cap() {
        let mut engine = engine(100);
        assert_eq!(engine.spawn(EffectType::FireSpark, 0.0, 0.0, 80, 1.0), 80);
        let spawned = engine.spawn(EffectType::FireSpark, 0.0, 0.0, 50, 1.0);
        assert!(spawned <= 20);
        assert_eq!(engine.active_count(), 100);
        assert_eq!(engine.stats().spawn_shortfall, 30);
    }

    #[test]
    fn test_update_expires_into_pool() {
        let mut engine = engine(200);
        engine.spawn(EffectType::LightningBolt, 500.0, 400.0, 100, 1.0);
        // Lightning lives at most 1.0s
        engine.update(0.5);
        assert_eq!(engine.grid().len(), engine.active_count());
        engine.update(0.6);
        assert_eq!(engine.active_count(), 0);
        assert_eq!(engine.pool().available(), 200);
        assert!(engine.grid().is_empty());
    }

    #[test]
    fn test_atmospherics_follow_tier_toggle() {
        let mut engine = engine(100);
        engine.apply_quality(&QualityLevel::Low.settings());
        assert_eq!(engine.spawn(EffectType::Atmospheric, 0.0, 0.0, 10, 1.0), 0);
    }

    #[test]
    fn test_render_draws_by_priority_and_culls() {
        let mut engine = engine(500);
        engine.spawn(EffectType::SandGrain, 100.0, 100.0, 20, 1.0);
        engine.spawn(EffectType::FireSpark, 900.0, 600.0, 20, 1.0);
        engine.update(0.016);

        let mut target = HeadlessTarget::new();
        let camera = Rect::new(0.0, 0.0, 300.0, 300.0);
        let calls = engine.render(&mut target, Some(camera));
        let stats = engine.stats();

        assert_eq!(u64::from(calls), target.counts().total());
        assert_eq!(stats.rendered, 20, "only the sand burst is in view");
        assert_eq!(stats.culled, 20);
        assert!(target.counts().min_alpha >= crate::effects::VISIBILITY_THRESHOLD);
    }

    #[test]
    fn test_render_without_camera_considers_all() {
        let mut engine = engine(500);
        engine.spawn(EffectType::SandGrain, 100.0, 100.0, 10, 1.0);
        engine.spawn(EffectType::SandGrain, 5000.0, 5000.0, 10, 1.0);
        engine.update(0.016);

        let mut target = HeadlessTarget::new();
        engine.render(&mut target, None);
        assert_eq!(engine.stats().rendered, 20);
    }

    #[test]
    fn test_cap_active_releases_lowest_priority_first() {
        let mut engine = engine(1000);
        engine.spawn(EffectType::SandGrain, 0.0, 0.0, 300, 1.0);
        engine.spawn(EffectType::SandSpiral, 0.0, 0.0, 300, 1.0);
        engine.update(0.0);

        assert_eq!(engine.cap_active(400), 200);
        let counts = engine.count_by_type();
        assert_eq!(counts[EffectType::SandGrain.index()], 100);
        assert_eq!(counts[EffectType::SandSpiral.index()], 300);
        assert_eq!(engine.max_particles(), 400);
        assert_eq!(engine.grid().len(), 400);
    }

    #[test]
    fn test_helpers() {
        let mut engine = engine(1000);
        // count and speed both scale with intensity
        assert_eq!(engine.combat_hit(0.0, 0.0, 15), 22);
        assert_eq!(engine.combat_hit(0.0, 0.0, 100), 40);
        assert_eq!(engine.sand_flow(0.0, 0.0, 1.0), 20);
        assert_eq!(engine.card_effect(CardKind::Power, 0.0, 0.0, 1.0), 15);
        assert_eq!(engine.clear_all(), 97);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_same_seed_same_particles() {
        let mut a = engine(100);
        let mut b = engine(100);
        a.spawn(EffectType::GoldenAura, 50.0, 50.0, 10, 1.0);
        b.spawn(EffectType::GoldenAura, 50.0, 50.0, 10, 1.0);
        let pa: Vec<_> = a.particles().copied().collect();
        let pb: Vec<_> = b.particles().copied().collect();
        assert_eq!(pa, pb);
        assert!(pa.iter().all(|p| p.velocity.y <= 0.0), "aura drifts upward");
    }
}
