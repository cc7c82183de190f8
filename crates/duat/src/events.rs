//! # Collaborator Events
//!
//! What the resource manager tells the game/UI layer, over a bounded
//! crossbeam channel.
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//! │ Coordinator │─────>│   Event     │─────>│  Game / UI  │
//! │ (frame loop)│      │   Channel   │      │   layer     │
//! └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! Sending never blocks the frame: a full channel drops the event and counts
//! the drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use duat_core::PressureEvent;
use duat_rendering::{AssetKey, AssetType, LoadResult, QualityChange, Surface};
use duat_shared::{PerformanceAlert, QualitySettings};

use crate::screen::ScreenType;

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Events emitted to the collaborator layer.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    // =========================================================================
    // Quality
    // =========================================================================
    /// The quality tier changed.
    QualityChanged {
        /// The transition.
        change: QualityChange,
        /// Settings now in force.
        settings: QualitySettings,
    },

    // =========================================================================
    // Diagnostics
    // =========================================================================
    /// The profiler raised an alert.
    PerformanceAlert(PerformanceAlert),

    /// Memory pressure changed level.
    MemoryPressure(PressureEvent),

    /// An emergency optimization ran.
    EmergencyOptimization {
        /// Particles released.
        particles_released: usize,
        /// Cache entries dropped.
        cache_entries_dropped: usize,
    },

    // =========================================================================
    // Assets & screens
    // =========================================================================
    /// A background load finished.
    AssetLoaded {
        /// Asset key.
        key: AssetKey,
        /// Kind of asset.
        asset_type: AssetType,
        /// Surface or the reason there is none.
        result: LoadResult<Surface>,
    },

    /// The active screen changed.
    ScreenChanged {
        /// Previous screen.
        from: Option<ScreenType>,
        /// New screen.
        to: ScreenType,
    },
}

impl EngineEvent {
    /// Stable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::QualityChanged { .. } => "quality_changed",
            Self::PerformanceAlert(_) => "performance_alert",
            Self::MemoryPressure(_) => "memory_pressure",
            Self::EmergencyOptimization { .. } => "emergency_optimization",
            Self::AssetLoaded { .. } => "asset_loaded",
            Self::ScreenChanged { .. } => "screen_changed",
        }
    }
}

/// Bounded event channel.
pub struct EventBus {
    sender: Sender<EngineEvent>,
    receiver: Receiver<EngineEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Producer handle.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Consumer handle. Clones compete for events.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Handle for sending events.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<EngineEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Sends without blocking. Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: EngineEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event) | TrySendError::Disconnected(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Log the first drop and then every thousandth
                if dropped == 1 || dropped % 1000 == 0 {
                    tracing::warn!(event = event.name(), dropped, "Event channel full, dropping");
                }
                false
            }
        }
    }

    /// Events dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle for receiving events.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<EngineEvent>,
}

impl EventReceiver {
    /// Every pending event. Never blocks.
    #[inline]
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.receiver.try_iter().collect()
    }

    /// One pending event, if any.
    #[inline]
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Any pending events?
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}
