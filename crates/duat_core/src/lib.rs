//! # Duat Core
//!
//! Memory primitives the rendering resource manager is built on:
//! - A fixed-capacity pool with generation-checked handles
//! - A memory manager that tracks weighted allocations without owning them
//! - A clock abstraction so every cadence can be driven by tests
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - pools are sized once at startup
//! 2. **Never extend a lifetime** - tracked objects are observed, not owned
//! 3. **Bounded pauses** - collection work is time-boxed per frame
//!
//! ## Example
//!
//! ```rust,ignore
//! use duat_core::{ManualClock, MemoryManager, MemoryType, MemoryPriority};
//!
//! let clock = ManualClock::new();
//! let sampler = Box::new(SystemMemorySampler::new());
//! let mut memory = MemoryManager::new(MemoryConfig::default(), clock.shared(), sampler);
//! let texture = Arc::new(vec![0u8; 4096]);
//! let id = memory.track(&texture, MemoryType::Texture, 4096, MemoryPriority::High);
//! drop(texture);
//! memory.update(2.0); // swept within two passes, nothing was kept alive
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod memory;
pub mod time;

pub use memory::{
    AllocationId, AllocationInfo, CollectionReport, CollectorStats, FixedSampler, Generation,
    IncrementalCollector, MemoryConfig, MemoryManager, MemoryPriority, MemoryReport,
    MemorySample, MemorySampler, MemoryType, MemoryUpdate, PoolAllocator, PoolHandle,
    PressureEvent, PressureLevel, PressureMonitor, SystemMemorySampler, UsageBucket,
    SCREEN_METADATA_KEY,
};
pub use time::{Clock, ManualClock, SharedClock, SystemClock};
