//! # Frame Profiler
//!
//! Wraps every frame between `start_frame` and `end_frame`, keeps a bounded
//! history of immutable [`FrameProfile`]s and raises advisory alerts.
//!
//! ```text
//!   start_frame ─► record_stage(..)* ─► end_frame(counters)
//!                                            │
//!                                            ├─► FrameProfile ─► ring buffer
//!                                            └─► alerts (spike, memory, leak)
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use duat_core::{MemorySample, SharedClock};
use duat_shared::{AlertKind, PerformanceAlert, ResourceConfig};
use serde::{Deserialize, Serialize};

use super::bottleneck::{self, Bottleneck};
use super::regression::percentile;
use super::stages::{FrameStage, ProfileCategory, StageTimings};

/// Values kept per custom metric.
const METRIC_HISTORY: usize = 600;
/// Frames within this many FPS of the target count as on target.
const TARGET_HIT_SLACK_FPS: f64 = 2.0;

/// Profiler tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerConfig {
    /// Target frame rate; the frame budget is `1000 / target_fps`.
    pub target_fps: f32,
    /// Frames kept in the ring buffer.
    pub history: usize,
    /// Spike when a frame exceeds `spike_factor × budget`.
    pub spike_factor: f64,
    /// Memory fraction that raises a pressure alert.
    pub memory_high_water: f32,
    /// Frames in the leak detection window.
    pub leak_window: usize,
    /// Growth across the window that counts as a leak (MB).
    pub leak_threshold_mb: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            history: 1800,
            spike_factor: 2.0,
            memory_high_water: 0.90,
            leak_window: 300,
            leak_threshold_mb: 50.0,
        }
    }
}

impl ProfilerConfig {
    /// Derives tuning from the resource configuration.
    #[must_use]
    pub fn from_resource(config: &ResourceConfig) -> Self {
        Self {
            target_fps: config.target_fps,
            history: config.profiler_history.max(1),
            memory_high_water: config.memory_critical_threshold,
            ..Self::default()
        }
    }

    /// Frame budget in milliseconds.
    #[must_use]
    pub fn frame_budget_ms(&self) -> f64 {
        1000.0 / f64::from(self.target_fps)
    }
}

/// Counters supplied by the caller when closing a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameCounters {
    /// Live particles after update.
    pub particle_count: usize,
    /// Draw calls issued.
    pub draw_calls: u32,
    /// Memory sample, if one was taken.
    pub memory: Option<MemorySample>,
    /// CPU load in `[0, 1]`, if sampled.
    pub cpu_usage: Option<f32>,
}

/// One closed frame. Never mutated after creation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameProfile {
    /// 1-based frame number.
    pub frame_number: u64,
    /// Clock time at `start_frame`.
    pub start: Duration,
    /// Clock time at `end_frame`.
    pub end: Duration,
    /// `end - start` in milliseconds.
    pub frame_time_ms: f64,
    /// `1000 / frame_time_ms`, zero for an instantaneous frame.
    pub fps: f64,
    /// Per-stage breakdown.
    pub stages: StageTimings,
    /// Memory snapshot.
    pub memory: Option<MemorySample>,
    /// Live particles.
    pub particle_count: usize,
    /// Draw calls.
    pub draw_calls: u32,
    /// CPU load.
    pub cpu_usage: Option<f32>,
}

/// Rolling statistics over the last N frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    /// Frames summarized.
    pub frames: usize,
    /// Mean frame time (ms).
    pub avg_frame_ms: f64,
    /// Fastest frame (ms).
    pub min_frame_ms: f64,
    /// Slowest frame (ms).
    pub max_frame_ms: f64,
    /// 95th percentile (ms).
    pub p95_frame_ms: f64,
    /// 99th percentile (ms).
    pub p99_frame_ms: f64,
    /// Standard deviation (ms).
    pub std_dev_ms: f64,
    /// `1000 / avg_frame_ms`.
    pub avg_fps: f64,
    /// Fraction of frames at or above `target - 2` FPS.
    pub target_hit_rate: f64,
}

/// Statistics of one custom metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    /// Category it was recorded under.
    pub category: ProfileCategory,
    /// Values kept.
    pub count: usize,
    /// Most recent value.
    pub last: f64,
    /// Mean of kept values.
    pub avg: f64,
    /// Smallest kept value.
    pub min: f64,
    /// Largest kept value.
    pub max: f64,
}

#[derive(Debug)]
struct MetricSeries {
    category: ProfileCategory,
    values: VecDeque<f64>,
}

/// Alert counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    /// `frame_time_spike` alerts.
    pub frame_time_spikes: u64,
    /// `memory_pressure` alerts.
    pub memory_pressure: u64,
    /// `potential_memory_leak` alerts.
    pub potential_leaks: u64,
}

/// Per-frame recorder.
pub struct FrameProfiler {
    config: ProfilerConfig,
    clock: SharedClock,
    frame_number: u64,
    current_start: Option<Duration>,
    current_stages: StageTimings,
    history: VecDeque<FrameProfile>,
    metrics: HashMap<String, MetricSeries>,
    memory_trail: VecDeque<f64>,
    memory_alert_armed: bool,
    last_leak_alert: Option<u64>,
    alert_counts: AlertCounts,
}

impl FrameProfiler {
    /// Creates an empty profiler.
    #[must_use]
    pub fn new(config: ProfilerConfig, clock: SharedClock) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history),
            memory_trail: VecDeque::with_capacity(config.leak_window),
            frame_number: 0,
            current_start: None,
            current_stages: StageTimings::default(),
            metrics: HashMap::new(),
            memory_alert_armed: true,
            last_leak_alert: None,
            alert_counts: AlertCounts::default(),
            clock,
            config,
        }
    }

    // =========================================================================
    // FRAME BRACKETS
    // =========================================================================

    /// Opens a frame.
    pub fn start_frame(&mut self) {
        self.frame_number += 1;
        self.current_start = Some(self.clock.now());
        self.current_stages = StageTimings::default();
    }

    /// Adds time to a stage of the open frame.
    pub fn record_stage(&mut self, stage: FrameStage, ms: f64) {
        self.current_stages.add(stage, ms);
    }

    /// Runs `work` and charges its clock time to `stage`.
    pub fn time_stage<R>(&mut self, stage: FrameStage, work: impl FnOnce() -> R) -> R {
        let started = self.clock.now();
        let out = work();
        let ms = self.clock.now().saturating_sub(started).as_secs_f64() * 1000.0;
        self.current_stages.add(stage, ms);
        out
    }

    /// Closes the frame, appends its profile, and returns any alerts.
    ///
    /// Without a matching `start_frame` the frame is zero-length.
    pub fn end_frame(&mut self, counters: FrameCounters) -> (FrameProfile, Vec<PerformanceAlert>) {
        let end = self.clock.now();
        let start = self.current_start.take().unwrap_or(end);
        let frame_time_ms = end.saturating_sub(start).as_secs_f64() * 1000.0;
        let profile = FrameProfile {
            frame_number: self.frame_number,
            start,
            end,
            frame_time_ms,
            fps: if frame_time_ms > 0.0 { 1000.0 / frame_time_ms } else { 0.0 },
            stages: self.current_stages,
            memory: counters.memory,
            particle_count: counters.particle_count,
            draw_calls: counters.draw_calls,
            cpu_usage: counters.cpu_usage,
        };

        let alerts = self.check_alerts(&profile);

        if self.history.len() >= self.config.history {
            self.history.pop_front();
        }
        self.history.push_back(profile);
        (profile, alerts)
    }

    fn check_alerts(&mut self, profile: &FrameProfile) -> Vec<PerformanceAlert> {
        let mut alerts = Vec::new();
        let n = profile.frame_number;

        let spike_ms = self.config.frame_budget_ms() * self.config.spike_factor;
        if profile.frame_time_ms > spike_ms {
            self.alert_counts.frame_time_spikes += 1;
            alerts.push(PerformanceAlert::new(
                AlertKind::FrameTimeSpike,
                n,
                profile.frame_time_ms,
                spike_ms,
            ));
        }

        if let Some(sample) = profile.memory {
            let fraction = sample.fraction();
            // Edge-triggered: re-armed once usage drops below the mark.
            if fraction >= self.config.memory_high_water {
                if self.memory_alert_armed {
                    self.memory_alert_armed = false;
                    self.alert_counts.memory_pressure += 1;
                    alerts.push(PerformanceAlert::new(
                        AlertKind::MemoryPressure,
                        n,
                        f64::from(fraction),
                        f64::from(self.config.memory_high_water),
                    ));
                }
            } else {
                self.memory_alert_armed = true;
            }

            if let Some(alert) = self.check_leak(n, sample.used_mb()) {
                alerts.push(alert);
            }
        }

        for alert in &alerts {
            tracing::debug!(
                kind = %alert.kind,
                frame = alert.frame_number,
                value = alert.value,
                threshold = alert.threshold,
                "Performance alert"
            );
        }
        alerts
    }

    fn check_leak(&mut self, frame: u64, used_mb: f64) -> Option<PerformanceAlert> {
        if self.memory_trail.len() >= self.config.leak_window {
            self.memory_trail.pop_front();
        }
        self.memory_trail.push_back(used_mb);
        if self.memory_trail.len() < self.config.leak_window {
            return None;
        }
        let window = self.config.leak_window as u64;
        if self.last_leak_alert.is_some_and(|at| frame - at < window) {
            return None;
        }
        let monotonic = self
            .memory_trail
            .iter()
            .zip(self.memory_trail.iter().skip(1))
            .all(|(a, b)| b >= a);
        let first = self.memory_trail.front().copied().unwrap_or(used_mb);
        let growth = used_mb - first;
        if !(monotonic && growth > self.config.leak_threshold_mb) {
            return None;
        }
        self.last_leak_alert = Some(frame);
        self.alert_counts.potential_leaks += 1;
        Some(PerformanceAlert::new(
            AlertKind::PotentialMemoryLeak,
            frame,
            growth,
            self.config.leak_threshold_mb,
        ))
    }

    /// Changes the target frame rate behind the spike threshold and the
    /// hit rate. Non-positive rates are ignored.
    pub fn set_target_fps(&mut self, target_fps: f32) {
        if target_fps.is_finite() && target_fps > 0.0 {
            self.config.target_fps = target_fps;
        }
    }

    // =========================================================================
    // CUSTOM METRICS
    // =========================================================================

    /// Records a named value.
    pub fn record_metric(&mut self, name: &str, category: ProfileCategory, value: f64) {
        if !self.metrics.contains_key(name) {
            self.metrics.insert(
                name.to_string(),
                MetricSeries {
                    category,
                    values: VecDeque::new(),
                },
            );
        }
        let Some(series) = self.metrics.get_mut(name) else {
            return;
        };
        series.category = category;
        if series.values.len() >= METRIC_HISTORY {
            series.values.pop_front();
        }
        series.values.push_back(value);
    }

    /// Statistics for a named metric.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<MetricStats> {
        let series = self.metrics.get(name)?;
        let last = *series.values.back()?;
        #[allow(clippy::cast_precision_loss)]
        let avg = series.values.iter().sum::<f64>() / series.values.len() as f64;
        Some(MetricStats {
            category: series.category,
            count: series.values.len(),
            last,
            avg,
            min: series.values.iter().copied().fold(f64::INFINITY, f64::min),
            max: series.values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Names of recorded metrics in `category`.
    pub fn metrics_in(&self, category: ProfileCategory) -> impl Iterator<Item = &str> + '_ {
        self.metrics
            .iter()
            .filter(move |(_, s)| s.category == category)
            .map(|(name, _)| name.as_str())
    }

    // =========================================================================
    // STATISTICS
    // =========================================================================

    /// Summary of the last `last_n` frames, `None` before the first frame.
    #[must_use]
    pub fn summary(&self, last_n: usize) -> Option<FrameSummary> {
        let take = last_n.min(self.history.len());
        if take == 0 {
            return None;
        }
        let mut times: Vec<f64> = self
            .history
            .iter()
            .skip(self.history.len() - take)
            .map(|p| p.frame_time_ms)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let variance = times.iter().map(|t| (t - avg).powi(2)).sum::<f64>() / n;
        let hit_floor = f64::from(self.config.target_fps) - TARGET_HIT_SLACK_FPS;
        #[allow(clippy::cast_precision_loss)]
        let hits = times
            .iter()
            .filter(|t| **t > 0.0 && 1000.0 / **t >= hit_floor)
            .count() as f64;
        times.sort_by(f64::total_cmp);

        Some(FrameSummary {
            frames: take,
            avg_frame_ms: avg,
            min_frame_ms: times[0],
            max_frame_ms: times[times.len() - 1],
            p95_frame_ms: percentile(&times, 95.0),
            p99_frame_ms: percentile(&times, 99.0),
            std_dev_ms: variance.sqrt(),
            avg_fps: if avg > 0.0 { 1000.0 / avg } else { 0.0 },
            target_hit_rate: hits / n,
        })
    }

    /// Mean stage breakdown of the last `last_n` frames.
    #[must_use]
    pub fn stage_averages(&self, last_n: usize) -> StageTimings {
        let skip = self.history.len().saturating_sub(last_n);
        StageTimings::mean(self.history.iter().skip(skip).map(|p| &p.stages))
    }

    /// What limits the frame rate, once enough frames exist.
    #[must_use]
    pub fn bottleneck(&self) -> Option<Bottleneck> {
        bottleneck::classify(&self.history)
    }

    /// The most recent profile.
    #[must_use]
    pub fn latest(&self) -> Option<&FrameProfile> {
        self.history.back()
    }

    /// Profiles, oldest first.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &FrameProfile> + '_ {
        self.history.iter()
    }

    /// Frames opened so far.
    #[must_use]
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Alerts raised so far.
    #[must_use]
    pub const fn alert_counts(&self) -> AlertCounts {
        self.alert_counts
    }

    /// Tuning.
    #[must_use]
    pub const fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Drops history, metrics and alert state. Frame numbering continues.
    pub fn clear(&mut self) {
        self.history.clear();
        self.metrics.clear();
        self.memory_trail.clear();
        self.memory_alert_armed = true;
        self.last_leak_alert = None;
    }
}

impl std::fmt::Debug for FrameProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProfiler")
            .field("frame_number", &self.frame_number)
            .field("history", &self.history.len())
            .field("metrics", &self.metrics.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duat_core::ManualClock;

    const MB: u64 = 1024 * 1024;

    fn profiler(config: ProfilerConfig) -> (FrameProfiler, ManualClock) {
        let clock = ManualClock::new();
        (FrameProfiler::new(config, clock.shared()), clock)
    }

    fn frame(
        p: &mut FrameProfiler,
        clock: &ManualClock,
        ms: f64,
        counters: FrameCounters,
    ) -> Vec<PerformanceAlert> {
        p.start_frame();
        clock.advance_ms(ms);
        p.end_frame(counters).1
    }

    #[test]
    fn test_frame_time_and_history_bound() {
        let (mut p, clock) = profiler(ProfilerConfig {
            history: 10,
            ..ProfilerConfig::default()
        });
        for _ in 0..25 {
            frame(&mut p, &clock, 16.0, FrameCounters::default());
        }
        assert_eq!(p.history().count(), 10);
        let latest = p.latest().expect("frame");
        assert_eq!(latest.frame_number, 25);
        assert!((latest.frame_time_ms - 16.0).abs() < 1e-6);
        assert!((latest.fps - 62.5).abs() < 1e-3);
    }

    #[test]
    fn test_spike_alert() {
        let (mut p, clock) = profiler(ProfilerConfig::default());
        assert!(frame(&mut p, &clock, 30.0, FrameCounters::default()).is_empty());
        let alerts = frame(&mut p, &clock, 40.0, FrameCounters::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::FrameTimeSpike);
        assert_eq!(alerts[0].frame_number, 2);
    }

    #[test]
    fn test_memory_alert_is_edge_triggered() {
        let (mut p, clock) = profiler(ProfilerConfig::default());
        let high = FrameCounters {
            memory: Some(MemorySample::new(95, 100)),
            ..FrameCounters::default()
        };
        let low = FrameCounters {
            memory: Some(MemorySample::new(50, 100)),
            ..FrameCounters::default()
        };
        assert_eq!(frame(&mut p, &clock, 10.0, high).len(), 1);
        assert!(frame(&mut p, &clock, 10.0, high).is_empty());
        assert!(frame(&mut p, &clock, 10.0, low).is_empty());
        assert_eq!(frame(&mut p, &clock, 10.0, high).len(), 1);
        assert_eq!(p.alert_counts().memory_pressure, 2);
    }

    #[test]
    fn test_leak_alert_once_per_window() {
        let (mut p, clock) = profiler(ProfilerConfig {
            leak_window: 50,
            ..ProfilerConfig::default()
        });
        let mut leaks = 0;
        for i in 0..150u64 {
            let counters = FrameCounters {
                memory: Some(MemorySample::new(100 * MB + i * 2 * MB, 64 * 1024 * MB)),
                ..FrameCounters::default()
            };
            leaks += frame(&mut p, &clock, 10.0, counters)
                .iter()
                .filter(|a| a.kind == AlertKind::PotentialMemoryLeak)
                .count();
        }
        // 98 MB of growth per 50 frames; one alert per window.
        assert_eq!(leaks, 3);
    }

    #[test]
    fn test_flat_memory_is_not_a_leak() {
        let (mut p, clock) = profiler(ProfilerConfig {
            leak_window: 20,
            ..ProfilerConfig::default()
        });
        for i in 0..100u64 {
            // Sawtooth: big net growth but never monotonic across a window.
            let used = 100 * MB + i * 5 * MB - (i % 10) * 8 * MB;
            let counters = FrameCounters {
                memory: Some(MemorySample::new(used, 64 * 1024 * MB)),
                ..FrameCounters::default()
            };
            assert!(frame(&mut p, &clock, 10.0, counters).is_empty());
        }
    }

    #[test]
    fn test_summary() {
        let (mut p, clock) = profiler(ProfilerConfig::default());
        for ms in [10.0, 20.0, 30.0, 40.0] {
            frame(&mut p, &clock, ms, FrameCounters::default());
        }
        let s = p.summary(100).expect("frames");
        assert_eq!(s.frames, 4);
        assert!((s.avg_frame_ms - 25.0).abs() < 1e-6);
        assert!((s.min_frame_ms - 10.0).abs() < 1e-6);
        assert!((s.max_frame_ms - 40.0).abs() < 1e-6);
        assert!((s.p95_frame_ms - 40.0).abs() < 1e-6);
        assert!((s.target_hit_rate - 0.25).abs() < 1e-9);

        let last_two = p.summary(2).expect("frames");
        assert!((last_two.avg_frame_ms - 35.0).abs() < 1e-6);
        assert!(FrameProfiler::new(ProfilerConfig::default(), clock.shared())
            .summary(10)
            .is_none());
    }

    #[test]
    fn test_stages_and_metrics() {
        let (mut p, clock) = profiler(ProfilerConfig::default());
        p.start_frame();
        let value = p.time_stage(FrameStage::Particles, || {
            clock.advance_ms(3.0);
            7
        });
        assert_eq!(value, 7);
        p.record_stage(FrameStage::Render, 2.0);
        p.end_frame(FrameCounters::default());
        let stages = p.stage_averages(1);
        assert!((stages.get(FrameStage::Particles) - 3.0).abs() < 1e-6);
        assert!((stages.get(FrameStage::Render) - 2.0).abs() < 1e-6);

        p.record_metric("cache_hit_rate", ProfileCategory::Assets, 0.5);
        p.record_metric("cache_hit_rate", ProfileCategory::Assets, 1.0);
        let m = p.metric("cache_hit_rate").expect("metric");
        assert_eq!(m.count, 2);
        assert!((m.avg - 0.75).abs() < 1e-9);
        assert_eq!(p.metrics_in(ProfileCategory::Assets).count(), 1);
        assert!(p.metric("absent").is_none());
    }
}
