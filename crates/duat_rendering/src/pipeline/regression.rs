//! Frame-time regression detection against a captured baseline.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Frames folded into the automatic baseline.
pub const BASELINE_FRAMES: usize = 300;
/// Frames compared against the baseline.
pub const RECENT_FRAMES: usize = 60;
/// Relative drift that counts as a regression.
pub const REGRESSION_THRESHOLD: f64 = 0.10;
/// Standard deviations below this (ms) are noise, never a regression.
pub const JITTER_FLOOR_MS: f64 = 1.0;

/// Frame-time statistics of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Mean frame time (ms)
    pub avg_ms: f64,
    /// 95th percentile frame time (ms)
    pub p95_ms: f64,
    /// `1000 / avg_ms`
    pub avg_fps: f64,
    /// Standard deviation of frame time (ms)
    pub std_dev_ms: f64,
}

impl Baseline {
    /// Statistics of `frame_times`, `None` if empty.
    #[must_use]
    pub fn from_frames(frame_times: &[f64]) -> Option<Self> {
        if frame_times.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = frame_times.len() as f64;
        let avg_ms = frame_times.iter().sum::<f64>() / n;
        let variance = frame_times.iter().map(|t| (t - avg_ms).powi(2)).sum::<f64>() / n;

        let mut sorted = frame_times.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            avg_ms,
            p95_ms: percentile(&sorted, 95.0),
            avg_fps: if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 },
            std_dev_ms: variance.sqrt(),
        })
    }
}

/// Value at percentile `p` of an ascending slice; index
/// `floor(len × p / 100)`, clamped.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let index = ((sorted.len() as f64 * p / 100.0) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Which statistic drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionKind {
    /// Mean frame time rose.
    AverageFrameTime,
    /// Tail frame time rose.
    P95FrameTime,
    /// Frame rate fell.
    Fps,
    /// Frame pacing got noisier.
    Variance,
}

/// One detected drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    /// Statistic.
    pub kind: RegressionKind,
    /// Baseline value.
    pub baseline: f64,
    /// Recent value.
    pub current: f64,
    /// Relative change in the bad direction.
    pub change: f64,
}

/// Compares recent frames against a baseline.
#[derive(Debug, Clone)]
pub struct RegressionDetector {
    baseline: Option<Baseline>,
    warmup: Vec<f64>,
    recent: VecDeque<f64>,
    threshold: f64,
}

impl Default for RegressionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RegressionDetector {
    /// Detector that captures its baseline from the first 300 frames.
    #[must_use]
    pub fn new() -> Self {
        Self {
            baseline: None,
            warmup: Vec::with_capacity(BASELINE_FRAMES),
            recent: VecDeque::with_capacity(RECENT_FRAMES),
            threshold: REGRESSION_THRESHOLD,
        }
    }

    /// Feeds one frame time.
    pub fn observe(&mut self, frame_time_ms: f64) {
        if !frame_time_ms.is_finite() {
            return;
        }
        if self.baseline.is_none() {
            self.warmup.push(frame_time_ms);
            if self.warmup.len() >= BASELINE_FRAMES {
                self.baseline = Baseline::from_frames(&self.warmup);
                self.warmup = Vec::new();
                tracing::debug!(baseline = ?self.baseline, "Captured performance baseline");
            }
        }
        if self.recent.len() >= RECENT_FRAMES {
            self.recent.pop_front();
        }
        self.recent.push_back(frame_time_ms);
    }

    /// Replaces the baseline with the recent window (or drops it if the
    /// window is empty, restarting the warmup).
    pub fn capture_baseline(&mut self) {
        self.baseline = Baseline::from_frames(self.recent.make_contiguous());
        self.warmup.clear();
    }

    /// Current baseline.
    #[must_use]
    pub const fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    /// Drifts beyond the threshold. Empty until a baseline exists and the
    /// recent window is full.
    #[must_use]
    pub fn check(&self) -> Vec<Regression> {
        let Some(base) = self.baseline else {
            return Vec::new();
        };
        if self.recent.len() < RECENT_FRAMES {
            return Vec::new();
        }
        let frames: Vec<f64> = self.recent.iter().copied().collect();
        let Some(now) = Baseline::from_frames(&frames) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut flag = |kind, baseline: f64, current: f64, change: f64| {
            if change > self.threshold {
                found.push(Regression {
                    kind,
                    baseline,
                    current,
                    change,
                });
            }
        };
        flag(
            RegressionKind::AverageFrameTime,
            base.avg_ms,
            now.avg_ms,
            rise(base.avg_ms, now.avg_ms),
        );
        flag(
            RegressionKind::P95FrameTime,
            base.p95_ms,
            now.p95_ms,
            rise(base.p95_ms, now.p95_ms),
        );
        flag(
            RegressionKind::Fps,
            base.avg_fps,
            now.avg_fps,
            (base.avg_fps - now.avg_fps) / base.avg_fps.max(f64::EPSILON),
        );
        if now.std_dev_ms >= JITTER_FLOOR_MS {
            flag(
                RegressionKind::Variance,
                base.std_dev_ms,
                now.std_dev_ms,
                rise(base.std_dev_ms, now.std_dev_ms),
            );
        }
        found
    }
}

/// Relative increase from `from` to `to`.
fn rise(from: f64, to: f64) -> f64 {
    (to - from) / from.max(f64::EPSILON)
}
