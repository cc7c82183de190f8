//! # Quality Controller
//!
//! Walks the five tiers from observed frame times.
//!
//! ```text
//!   avg_fps < 0.85 × target                      ──► step down (next evaluation)
//!   avg_fps > 1.05 × target AND p95 < 0.95 × budget
//!       AND held continuously for the stability window ──► step up
//! ```
//!
//! Good/not-good is judged on every recorded frame; the stability timer
//! restarts the moment the window stops being good. Tier decisions only
//! happen on the evaluation cadence. Downgrades are immediate on that
//! cadence, upgrades are not.
//!
//! The decision target is the configured frame rate, not the tier's
//! informational `target_fps`, so Minimal (30 FPS) cannot oscillate.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use duat_core::SharedClock;
use duat_shared::{DuatResult, QualityLevel, QualityOverrides, QualitySettings, ResourceConfig};

/// Average FPS below `target × DOWNGRADE_RATIO` steps down.
pub const DOWNGRADE_RATIO: f32 = 0.85;
/// Average FPS above `target × UPGRADE_RATIO` counts toward an upgrade.
pub const UPGRADE_RATIO: f32 = 1.05;
/// p95 frame time must stay under `budget × P95_HEADROOM` for an upgrade.
pub const P95_HEADROOM: f32 = 0.95;
/// Frames in the rolling window.
pub const FPS_WINDOW: usize = 60;
/// Frames required before any decision.
pub const MIN_SAMPLES: usize = 30;
/// Tier changes remembered.
const HISTORY_LEN: usize = 32;

/// Controller tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityControllerConfig {
    /// Frame rate all comparisons are made against.
    pub target_fps: f32,
    /// Time between evaluations.
    pub eval_interval: Duration,
    /// How long good performance must hold before an upgrade.
    pub stability_window: Duration,
    /// Start with automatic adjustment on.
    pub auto_adjust: bool,
    /// Rolling window length in frames.
    pub window: usize,
    /// Samples required before deciding.
    pub min_samples: usize,
}

impl Default for QualityControllerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            eval_interval: Duration::from_secs(3),
            stability_window: Duration::from_secs(2),
            auto_adjust: true,
            window: FPS_WINDOW,
            min_samples: MIN_SAMPLES,
        }
    }
}

impl QualityControllerConfig {
    /// Derives tuning from the resource configuration.
    #[must_use]
    pub fn from_resource(config: &ResourceConfig) -> Self {
        Self {
            target_fps: config.target_fps,
            eval_interval: Duration::from_secs_f32(config.quality_eval_interval_secs.max(0.0)),
            stability_window: Duration::from_secs_f32(config.quality_stability_secs.max(0.0)),
            auto_adjust: config.auto_quality_adjust,
            ..Self::default()
        }
    }
}

/// Why the tier changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// Average FPS fell below the downgrade threshold.
    Downgrade,
    /// Good performance held for the stability window.
    Upgrade,
    /// `set_quality_level` was called.
    Manual,
    /// A screen asked for its preferred tier.
    Screen,
    /// Restored from a preference record or hardware detection.
    Restored,
}

impl ChangeReason {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Downgrade => "downgrade",
            Self::Upgrade => "upgrade",
            Self::Manual => "manual",
            Self::Screen => "screen",
            Self::Restored => "restored",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tier transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityChange {
    /// Previous tier.
    pub from: QualityLevel,
    /// New tier.
    pub to: QualityLevel,
    /// Why.
    pub reason: ChangeReason,
    /// Clock time of the change.
    pub at: Duration,
    /// Rolling average FPS at the time, if known.
    pub avg_fps: Option<f32>,
}

/// Advice derived from the rolling average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommendation {
    /// Lower the particle cap.
    ReduceParticles,
    /// Turn atmospheric particles off.
    DisableAtmospherics,
    /// Store textures compressed.
    EnableCompression,
    /// There is headroom for a richer tier.
    CanUpgrade,
    /// Nothing to do.
    Optimal,
}

/// Adaptive tier state machine.
pub struct QualityController {
    config: QualityControllerConfig,
    clock: SharedClock,
    level: QualityLevel,
    settings: QualitySettings,
    overrides: QualityOverrides,
    auto_adjust: bool,
    frame_times: VecDeque<f32>,
    scratch: Vec<f32>,
    good_since: Option<Duration>,
    last_eval: Duration,
    history: VecDeque<QualityChange>,
}

impl QualityController {
    /// Controller starting at `level`.
    #[must_use]
    pub fn new(config: QualityControllerConfig, level: QualityLevel, clock: SharedClock) -> Self {
        let last_eval = clock.now();
        Self {
            auto_adjust: config.auto_adjust,
            frame_times: VecDeque::with_capacity(config.window),
            scratch: Vec::with_capacity(config.window),
            settings: level.settings(),
            overrides: QualityOverrides::default(),
            good_since: None,
            history: VecDeque::with_capacity(HISTORY_LEN),
            level,
            last_eval,
            clock,
            config,
        }
    }

    // =========================================================================
    // SAMPLING
    // =========================================================================

    /// Records one frame time and refreshes the stability timer.
    pub fn record_frame(&mut self, frame_time_ms: f32) {
        if !frame_time_ms.is_finite() || frame_time_ms <= 0.0 {
            return;
        }
        if self.frame_times.len() >= self.config.window {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time_ms);

        if self.window_is_good() {
            if self.good_since.is_none() {
                self.good_since = Some(self.clock.now());
            }
        } else {
            self.good_since = None;
        }
    }

    fn window_is_good(&mut self) -> bool {
        if self.frame_times.len() < self.config.min_samples {
            return false;
        }
        let (Some(avg), Some(p95)) = (self.average_fps(), self.percentile_frame_time(95.0)) else {
            return false;
        };
        avg > self.config.target_fps * UPGRADE_RATIO && p95 < self.frame_budget_ms() * P95_HEADROOM
    }

    /// Evaluates if the cadence is due and auto-adjustment is on.
    pub fn update(&mut self) -> Option<QualityChange> {
        let now = self.clock.now();
        if now.saturating_sub(self.last_eval) < self.config.eval_interval {
            return None;
        }
        self.evaluate()
    }

    /// Evaluates now, regardless of cadence.
    pub fn evaluate(&mut self) -> Option<QualityChange> {
        let now = self.clock.now();
        self.last_eval = now;
        if !self.auto_adjust || self.frame_times.len() < self.config.min_samples {
            return None;
        }
        let avg = self.average_fps()?;

        if avg < self.config.target_fps * DOWNGRADE_RATIO {
            let next = self.level.step_down()?;
            return Some(self.change_to(next, ChangeReason::Downgrade));
        }

        let stable = self
            .good_since
            .is_some_and(|since| now.saturating_sub(since) >= self.config.stability_window);
        if stable {
            let next = self.level.step_up()?;
            return Some(self.change_to(next, ChangeReason::Upgrade));
        }
        None
    }

    fn change_to(&mut self, level: QualityLevel, reason: ChangeReason) -> QualityChange {
        let change = QualityChange {
            from: self.level,
            to: level,
            reason,
            at: self.clock.now(),
            avg_fps: self.average_fps(),
        };
        self.level = level;
        self.settings = self.compose(level);
        self.reset_stability();

        if self.history.len() >= HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(change);
        tracing::info!(
            from = %change.from,
            to = %change.to,
            reason = %reason,
            avg_fps = change.avg_fps,
            "Quality tier changed"
        );
        change
    }

    /// Preset for `level` with the current overrides, falling back to the
    /// bare preset if the combination does not validate.
    fn compose(&self, level: QualityLevel) -> QualitySettings {
        let settings = self.overrides.apply(level.settings());
        match settings.validate() {
            Ok(()) => settings,
            Err(err) => {
                tracing::warn!(%err, %level, "Overrides invalid for tier, using preset");
                level.settings()
            }
        }
    }

    // =========================================================================
    // CONTROL
    // =========================================================================

    /// Pins a tier and turns automatic adjustment off.
    pub fn set_quality_level(&mut self, level: QualityLevel) -> Option<QualityChange> {
        self.auto_adjust = false;
        (level != self.level).then(|| self.change_to(level, ChangeReason::Manual))
    }

    /// Moves to `level` for a screen or a restored preference, keeping
    /// automatic adjustment as it is.
    pub fn retune(&mut self, level: QualityLevel, reason: ChangeReason) -> Option<QualityChange> {
        (level != self.level).then(|| self.change_to(level, reason))
    }

    /// Turns automatic adjustment on or off. Enabling starts a fresh window.
    pub fn set_auto_adjust(&mut self, enabled: bool) {
        if enabled && !self.auto_adjust {
            self.reset_stability();
            self.last_eval = self.clock.now();
        }
        self.auto_adjust = enabled;
    }

    /// Changes the frame rate decisions are made against. Starts a fresh
    /// window; non-positive rates are ignored.
    pub fn set_target_fps(&mut self, target_fps: f32) {
        if target_fps.is_finite() && target_fps > 0.0 {
            self.config.target_fps = target_fps;
            self.reset_stability();
        }
    }

    /// Layers `overrides` over the current tier.
    ///
    /// # Errors
    ///
    /// The validation failure; the previous settings stay in force.
    pub fn apply_overrides(&mut self, overrides: QualityOverrides) -> DuatResult<QualitySettings> {
        match overrides.create_custom_preset(self.level) {
            Ok(settings) => {
                self.overrides = overrides;
                self.settings = settings;
                Ok(settings)
            }
            Err(err) => {
                tracing::warn!(%err, "Rejected quality overrides, keeping previous settings");
                Err(err)
            }
        }
    }

    /// Drops overrides, back to the bare preset.
    pub fn clear_overrides(&mut self) {
        self.overrides = QualityOverrides::default();
        self.settings = self.level.settings();
    }

    /// Forgets the rolling window and the stability timer.
    pub fn reset_stability(&mut self) {
        self.frame_times.clear();
        self.good_since = None;
    }

    /// Restarts the upgrade stability timer. The rolling window is kept, so
    /// downgrade decisions still see the frames recorded so far.
    pub fn reset_upgrade_timer(&mut self) {
        self.good_since = None;
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Current tier.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> QualityLevel {
        self.level
    }

    /// Current settings, overrides included.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Current overrides.
    #[must_use]
    pub const fn overrides(&self) -> &QualityOverrides {
        &self.overrides
    }

    /// Is automatic adjustment on?
    #[inline]
    #[must_use]
    pub const fn auto_adjust(&self) -> bool {
        self.auto_adjust
    }

    /// Decision target.
    #[must_use]
    pub const fn target_fps(&self) -> f32 {
        self.config.target_fps
    }

    /// `1000 / target_fps`.
    #[must_use]
    pub fn frame_budget_ms(&self) -> f32 {
        1000.0 / self.config.target_fps
    }

    /// Frames in the window.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.frame_times.len()
    }

    /// `1000 / mean frame time` over the window.
    #[must_use]
    pub fn average_fps(&self) -> Option<f32> {
        if self.frame_times.is_empty() {
            return None;
        }
        let sum: f32 = self.frame_times.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / self.frame_times.len() as f32;
        Some(1000.0 / mean)
    }

    /// Frame time at percentile `p` of the window.
    pub fn percentile_frame_time(&mut self, p: f32) -> Option<f32> {
        if self.frame_times.is_empty() {
            return None;
        }
        self.scratch.clear();
        self.scratch.extend(self.frame_times.iter().copied());
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let index = ((self.scratch.len() as f32 * p / 100.0) as usize).min(self.scratch.len() - 1);
        let (_, value, _) = self.scratch.select_nth_unstable_by(index, f32::total_cmp);
        Some(*value)
    }

    /// How long the window has been good, if it is.
    #[must_use]
    pub fn stable_for(&self) -> Option<Duration> {
        self.good_since
            .map(|since| self.clock.now().saturating_sub(since))
    }

    /// Recent tier changes, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &QualityChange> + '_ {
        self.history.iter()
    }

    /// Advice from the rolling average. Empty until a frame is recorded.
    #[must_use]
    pub fn recommendations(&self) -> Vec<Recommendation> {
        let Some(avg) = self.average_fps() else {
            return Vec::new();
        };
        let target = self.config.target_fps;
        if avg < target * 0.9 {
            let mut advice = vec![Recommendation::ReduceParticles];
            if self.settings.atmospheric_particles {
                advice.push(Recommendation::DisableAtmospherics);
            }
            if !self.settings.asset_compression {
                advice.push(Recommendation::EnableCompression);
            }
            advice
        } else if avg > target * 1.2 && self.level.step_up().is_some() {
            vec![Recommendation::CanUpgrade]
        } else {
            vec![Recommendation::Optimal]
        }
    }
}

impl fmt::Debug for QualityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityController")
            .field("level", &self.level)
            .field("auto_adjust", &self.auto_adjust)
            .field("samples", &self.frame_times.len())
            .field("good_since", &self.good_since)
            .finish_non_exhaustive()
    }
}
