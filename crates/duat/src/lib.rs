//! # Duat
//!
//! Adaptive real-time rendering resource manager for a 2D card game.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   PERFORMANCE COORDINATOR                    │
//! ├──────────────┬──────────────┬──────────────┬─────────────────┤
//! │  Particles   │ Asset cache  │   Quality    │     Memory      │
//! │ pool + grid  │ LRU + loader │ tier machine │ tracker + GC    │
//! ├──────────────┴──────────────┴──────────────┴─────────────────┤
//! │               Frame profiler → alerts → events               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **One owner** - the coordinator owns every subsystem, no globals
//! 2. **One thread** - only the loader's workers run off the frame thread
//! 3. **Degrade, never fail** - exhaustion and pressure lower quality
//!
//! ## Example
//!
//! ```rust,ignore
//! use duat::{CoordinatorBuilder, ScreenType};
//! use duat_rendering::HeadlessTarget;
//! use duat_shared::ResourceConfig;
//!
//! let mut duat = CoordinatorBuilder::new(ResourceConfig::default()).build()?;
//! duat.set_screen(ScreenType::Combat);
//! let mut target = HeadlessTarget::new();
//! loop {
//!     let outcome = duat.run_frame(1.0 / 60.0, &mut target, None);
//!     for event in duat.events().drain() {
//!         // hand to the UI layer
//!     }
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod coordinator;
pub mod events;
pub mod screen;

pub use coordinator::{
    CoordinatorBuilder, EmergencyReport, FrameOutcome, PerformanceCoordinator,
    EMERGENCY_PARTICLE_CAP, MIN_PARTICLE_CAP, OPTIMIZATION_INTERVAL,
};
pub use events::{EngineEvent, EventBus, EventReceiver, EventSender, DEFAULT_EVENT_CAPACITY};
pub use screen::{PerformanceTarget, ScreenType};

/// Re-export of the subsystem crates.
pub use duat_core as core;
pub use duat_rendering as rendering;
pub use duat_shared as shared;
