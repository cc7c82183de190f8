//! # Duat Rendering Resources
//!
//! Everything a frame needs besides the graphics API itself:
//! - A pooled particle engine culled through a uniform spatial grid
//! - A byte-budgeted LRU asset cache fed by a priority background loader
//! - A five-tier quality controller that trades fidelity for frame rate
//! - A frame profiler that turns timings into alerts and reports
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ONE FRAME                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  drain loads → particles.update → cache.maintain → render    │
//! │       ↑                                            ↓         │
//! │  loader workers                        profiler.end_frame    │
//! │                                                    ↓         │
//! │  particles.apply_quality  ←──────  quality.update            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **The frame never waits on I/O** - loads finish on workers
//! 2. **No allocations in the particle path** - the pool is sized once
//! 3. **Exhaustion degrades** - a full pool spawns fewer particles, a full
//!    cache evicts, a failed load reports an error value
//!
//! ## Example
//!
//! ```rust,ignore
//! use duat_rendering::{EffectType, HeadlessTarget, ParticleEngine};
//!
//! let mut particles = ParticleEngine::default();
//! particles.spawn(EffectType::SandGrain, 400.0, 300.0, 20, 1.0);
//! particles.update(1.0 / 60.0);
//! let drawn = particles.render(&mut HeadlessTarget::new(), None);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod assets;
pub mod effects;
pub mod pipeline;
pub mod quality;
pub mod target;

pub use assets::{
    AssetCache, AssetKey, AssetSource, AssetType, BackgroundLoader, CacheStats, CompletedLoad,
    DirectorySource, EntryMetadata, GeneratedSource, LoadError, LoadPriority, LoadRequest,
    LoadResult, PreloadPlan, Submission, Surface,
};
pub use effects::{
    CardKind, EffectType, Particle, ParticleEngine, ParticleEngineConfig, ParticlePool,
    ParticleStats, SpatialGrid,
};
pub use pipeline::{
    Bottleneck, FrameCounters, FrameProfile, FrameProfiler, FrameStage, FrameSummary,
    PerformanceReport, ProfilerConfig, RegressionDetector,
};
pub use quality::{
    ChangeReason, CpuMonitor, HardwareProfile, HardwareTier, QualityChange, QualityController,
    QualityControllerConfig, QualityPreferences, Recommendation,
};
pub use target::{DrawCounts, HeadlessTarget, RenderTarget, Rgba};
