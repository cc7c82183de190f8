//! # Frame Pipeline Instrumentation
//!
//! This module provides:
//! - `FrameProfiler` - per-frame timing, bounded history, advisory alerts
//! - `FrameStage` / `StageTimings` - where the frame budget went
//! - `Bottleneck` - what is limiting the frame rate
//! - `RegressionDetector` - drift against a captured baseline
//! - `PerformanceReport` - TOML snapshot of everything

mod bottleneck;
mod profiler;
mod regression;
mod report;
mod stages;

pub use bottleneck::{classify as classify_bottleneck, Bottleneck};
pub use profiler::{
    AlertCounts, FrameCounters, FrameProfile, FrameProfiler, FrameSummary, MetricStats,
    ProfilerConfig,
};
pub use regression::{
    percentile, Baseline, Regression, RegressionDetector, RegressionKind, BASELINE_FRAMES,
    RECENT_FRAMES, REGRESSION_THRESHOLD,
};
pub use report::{CacheSection, MemorySection, ParticleSection, PerformanceReport, StageBreakdown};
pub use stages::{FrameStage, ProfileCategory, StageTimings};
