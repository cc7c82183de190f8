//! # Duat Shared
//!
//! Plain data shared by every subsystem of the resource manager.
//!
//! ## Contents
//!
//! - [`ResourceConfig`]: the recognized configuration surface, loaded from TOML
//! - [`DuatError`]: configuration and persistence failures
//! - [`QualityLevel`] / [`QualitySettings`]: the five tiers and their presets
//! - [`PerformanceAlert`]: advisory signals raised by the frame profiler
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER spawn threads or touch a render target.
//! If you need either, put it in `duat_core` or `duat_rendering`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod alerts;
pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod quality;

pub use alerts::{AlertKind, PerformanceAlert};
pub use config::ResourceConfig;
pub use constants::{
    DEFAULT_CACHE_BUDGET_MB, DEFAULT_MAX_PARTICLES, DEFAULT_TARGET_FPS, DEFAULT_WORKER_THREADS,
    MAX_WORKER_THREADS,
};
pub use error::{DuatError, DuatResult};
pub use math::{Rect, Vec2};
pub use quality::{DetailLevel, QualityLevel, QualityOverrides, QualitySettings};
