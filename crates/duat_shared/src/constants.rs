//! # Resource Manager Defaults
//!
//! Values used when a configuration file omits an option.
//! Changing one of these changes behavior for every consumer that relies on defaults.

// =============================================================================
// RECOGNIZED OPTIONS
// =============================================================================

/// Asset cache budget in megabytes.
pub const DEFAULT_CACHE_BUDGET_MB: u64 = 512;

/// Hard particle pool capacity.
pub const DEFAULT_MAX_PARTICLES: usize = 2000;

/// Frame rate every quality decision is measured against.
pub const DEFAULT_TARGET_FPS: f32 = 60.0;

/// Background decode workers.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Upper bound accepted for `worker_thread_count`.
pub const MAX_WORKER_THREADS: usize = 16;

// =============================================================================
// VIEWPORT & CULLING
// =============================================================================

/// Default viewport width (ultrawide).
pub const DEFAULT_SCREEN_WIDTH: u32 = 3440;

/// Default viewport height.
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1440;

/// Side of one spatial grid cell, in pixels.
pub const DEFAULT_GRID_CELL_SIZE: u32 = 64;

// =============================================================================
// CONTROL LOOP CADENCE
// =============================================================================

/// Frames kept in the profiler history (30 seconds at 60 FPS).
pub const DEFAULT_PROFILER_HISTORY: usize = 1800;

/// Seconds between quality evaluations.
pub const DEFAULT_QUALITY_EVAL_INTERVAL_SECS: f32 = 3.0;

/// Seconds good performance must persist before an upgrade.
pub const DEFAULT_QUALITY_STABILITY_SECS: f32 = 2.0;

/// Fraction of system memory that raises a pressure warning.
pub const DEFAULT_MEMORY_WARNING_THRESHOLD: f32 = 0.80;

/// Fraction of system memory that raises a critical pressure event.
pub const DEFAULT_MEMORY_CRITICAL_THRESHOLD: f32 = 0.90;

/// Seconds between memory pressure samples.
pub const DEFAULT_MEMORY_CHECK_INTERVAL_SECS: f32 = 1.0;

/// Bytes in one megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;
