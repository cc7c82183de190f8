//! # Memory Management
//!
//! Pre-allocated pools and a non-owning allocation tracker.
//!
//! ## Design Philosophy
//!
//! Particle storage is allocated once at startup. Everything else that
//! occupies meaningful memory (textures, audio, cached data) is registered
//! with the [`MemoryManager`], which:
//! - Never keeps a tracked object alive
//! - Bounds its collection work by a per-frame time budget
//! - Answers memory pressure by evicting the least important records first

mod allocation;
mod collector;
mod manager;
mod pool;
mod pressure;

pub use allocation::{AllocationId, AllocationInfo, Generation, MemoryPriority, MemoryType};
pub use collector::{CollectionReport, CollectorStats, IncrementalCollector};
pub use manager::{
    MemoryConfig, MemoryManager, MemoryReport, MemoryUpdate, UsageBucket, SCREEN_METADATA_KEY,
};
pub use pool::{PoolAllocator, PoolHandle};
pub use pressure::{
    FixedSampler, MemorySample, MemorySampler, PressureEvent, PressureLevel, PressureMonitor,
    SystemMemorySampler,
};
