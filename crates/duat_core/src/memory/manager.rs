//! # Memory Manager
//!
//! Tracks weighted allocations by type and priority and reacts to memory
//! pressure. The manager OBSERVES objects, it never owns them:
//!
//! - `Arc` owners are tracked through a `Weak`, so the record disappears once
//!   the last strong reference elsewhere is dropped.
//! - Anything else (pool slots, GPU handles) is tracked through a liveness
//!   probe supplied by the owner.
//!
//! Evicting a record runs its optional release hook; that is the only way
//! the manager ever asks an owner to let go of memory.

use super::allocation::{
    AllocationId, AllocationInfo, AllocationRecord, Generation, LivenessProbe, MemoryPriority,
    MemoryType, ReleaseHook,
};
use super::collector::{CollectionReport, CollectorStats, IncrementalCollector};
use super::pressure::{MemorySample, MemorySampler, PressureEvent, PressureLevel, PressureMonitor};
use crate::time::SharedClock;
use duat_shared::ResourceConfig;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Metadata key naming the screen an allocation belongs to.
pub const SCREEN_METADATA_KEY: &str = "screen";

/// Memory manager configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Used fraction that raises a warning.
    pub warning_threshold: f32,
    /// Used fraction that raises critical pressure.
    pub critical_threshold: f32,
    /// Time between pressure samples.
    pub check_interval: Duration,
    /// Time between background cleanups of expired temporary data.
    pub cleanup_interval: Duration,
    /// Age after which temporary allocations expire.
    pub temporary_max_age: Duration,
    /// Medium allocations touched within this window survive critical pressure.
    pub recent_access_window: Duration,
    /// Collection budget used by the warning response (ms).
    pub warning_collect_budget_ms: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 0.80,
            critical_threshold: 0.90,
            check_interval: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(30),
            temporary_max_age: Duration::from_secs(60),
            recent_access_window: Duration::from_secs(30),
            warning_collect_budget_ms: 5.0,
        }
    }
}

impl MemoryConfig {
    /// Derives the pressure settings from the resource configuration.
    #[must_use]
    pub fn from_resource(config: &ResourceConfig) -> Self {
        Self {
            warning_threshold: config.memory_warning_threshold,
            critical_threshold: config.memory_critical_threshold,
            check_interval: Duration::from_secs_f32(config.memory_check_interval_secs),
            ..Self::default()
        }
    }
}

/// What one `update` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryUpdate {
    /// The incremental collection pass
    pub collection: CollectionReport,
    /// Pressure transition observed this frame, if any
    pub pressure: Option<PressureEvent>,
    /// Records evicted by the pressure response or cleanup
    pub evicted: usize,
    /// Bytes those records accounted for
    pub evicted_bytes: u64,
}

/// Count and bytes for one bucket of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageBucket {
    /// Live records
    pub count: usize,
    /// Bytes they account for
    pub bytes: u64,
}

/// Snapshot of everything the manager knows.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryReport {
    /// Total tracked bytes
    pub total_bytes: u64,
    /// Total tracked records
    pub allocation_count: usize,
    /// Usage per [`MemoryType`], indexed by `MemoryType::index`
    pub by_type: [UsageBucket; MemoryType::COUNT],
    /// Usage per [`MemoryPriority`], indexed by `MemoryPriority::index`
    pub by_priority: [UsageBucket; MemoryPriority::COUNT],
    /// Current pressure level
    pub pressure: PressureLevel,
    /// Most recent system sample
    pub last_sample: Option<MemorySample>,
    /// Collector statistics
    pub collector: CollectorStats,
    /// Records evicted since startup
    pub evicted_total: u64,
}

impl MemoryReport {
    /// Usage for one memory type.
    #[must_use]
    pub const fn for_type(&self, kind: MemoryType) -> UsageBucket {
        self.by_type[kind.index()]
    }

    /// Usage for one priority class.
    #[must_use]
    pub const fn for_priority(&self, priority: MemoryPriority) -> UsageBucket {
        self.by_priority[priority.index()]
    }
}

/// Allocation tracker with pressure response and time-boxed collection.
pub struct MemoryManager {
    config: MemoryConfig,
    clock: SharedClock,
    sampler: Box<dyn MemorySampler>,
    table: BTreeMap<AllocationId, AllocationRecord>,
    next_serial: u64,
    collector: IncrementalCollector,
    monitor: PressureMonitor,
    last_cleanup: Duration,
    evicted_total: u64,
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("allocations", &self.table.len())
            .field("total_bytes", &self.total_bytes())
            .field("pressure", &self.monitor.level())
            .finish_non_exhaustive()
    }
}

impl MemoryManager {
    /// Creates a manager sampling memory through `sampler`.
    #[must_use]
    pub fn new(config: MemoryConfig, clock: SharedClock, sampler: Box<dyn MemorySampler>) -> Self {
        let monitor = PressureMonitor::new(
            config.warning_threshold,
            config.critical_threshold,
            config.check_interval,
        );
        let last_cleanup = clock.now();
        Self {
            config,
            clock,
            sampler,
            table: BTreeMap::new(),
            next_serial: 0,
            collector: IncrementalCollector::new(),
            monitor,
            last_cleanup,
            evicted_total: 0,
        }
    }

    // =========================================================================
    // TRACKING
    // =========================================================================

    /// Tracks an `Arc`-owned object. Only a `Weak` is kept.
    pub fn track<T>(
        &mut self,
        owner: &Arc<T>,
        kind: MemoryType,
        size: u64,
        priority: MemoryPriority,
    ) -> AllocationId
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let weak: Weak<T> = Arc::downgrade(owner);
        let probe: LivenessProbe = Box::new(move || weak.strong_count() > 0);
        self.insert(kind, size, priority, Some(probe))
    }

    /// Tracks an object whose liveness is reported by `probe`.
    pub fn track_with_probe<F>(
        &mut self,
        probe: F,
        kind: MemoryType,
        size: u64,
        priority: MemoryPriority,
    ) -> AllocationId
    where
        F: Fn() -> bool + Send + 'static,
    {
        let probe: LivenessProbe = Box::new(probe);
        self.insert(kind, size, priority, Some(probe))
    }

    /// Tracks a record that lives until [`MemoryManager::untrack`] or eviction.
    pub fn track_manual(&mut self, kind: MemoryType, size: u64, priority: MemoryPriority) -> AllocationId {
        self.insert(kind, size, priority, None)
    }

    fn insert(
        &mut self,
        kind: MemoryType,
        size: u64,
        priority: MemoryPriority,
        probe: Option<LivenessProbe>,
    ) -> AllocationId {
        self.next_serial += 1;
        let id = AllocationId::new(self.next_serial, kind);
        let now = self.clock.now();
        self.table.insert(
            id,
            AllocationRecord {
                id,
                size,
                priority,
                created: now,
                last_access: now,
                access_count: 1,
                generation: Generation::Young,
                swept_pass: 0,
                probe,
                release: None,
                metadata: BTreeMap::new(),
            },
        );
        id
    }

    /// Attaches a hook run when the manager evicts `id`.
    pub fn set_release_hook<F>(&mut self, id: AllocationId, hook: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(record) = self.table.get_mut(&id) else {
            return false;
        };
        record.release = Some(Box::new(hook) as ReleaseHook);
        true
    }

    /// Sets a metadata entry on `id`.
    pub fn set_metadata(&mut self, id: AllocationId, key: impl Into<String>, value: impl Into<String>) -> bool {
        let Some(record) = self.table.get_mut(&id) else {
            return false;
        };
        record.metadata.insert(key.into(), value.into());
        true
    }

    /// Records an access to `id`.
    pub fn touch(&mut self, id: AllocationId) -> bool {
        let now = self.clock.now();
        let Some(record) = self.table.get_mut(&id) else {
            return false;
        };
        record.last_access = now;
        record.access_count += 1;
        true
    }

    /// Stops tracking `id` without running its release hook.
    pub fn untrack(&mut self, id: AllocationId) -> Option<AllocationInfo> {
        self.table.remove(&id).map(|record| record.info())
    }

    /// Is `id` still tracked? Dead owners stay tracked until the next sweep.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self, id: AllocationId) -> bool {
        self.table.contains_key(&id)
    }

    /// Snapshot of one record.
    #[must_use]
    pub fn info(&self, id: AllocationId) -> Option<AllocationInfo> {
        self.table.get(&id).map(AllocationRecord::info)
    }

    /// Tracked records.
    #[inline]
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.table.len()
    }

    /// Tracked bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.table.values().map(|record| record.size).sum()
    }

    /// Current pressure level.
    #[inline]
    #[must_use]
    pub const fn pressure_level(&self) -> PressureLevel {
        self.monitor.level()
    }

    /// Most recent system memory sample.
    #[inline]
    #[must_use]
    pub const fn last_sample(&self) -> Option<MemorySample> {
        self.monitor.last_sample()
    }

    /// Cumulative collector statistics.
    #[inline]
    #[must_use]
    pub const fn collector_stats(&self) -> CollectorStats {
        self.collector.stats()
    }

    // =========================================================================
    // PER-FRAME
    // =========================================================================

    /// Per-frame maintenance, bounded by `frame_time_budget_ms`.
    ///
    /// 1. Incremental collection (cheapest generation first)
    /// 2. Pressure sample if the cadence allows, and the matching response
    /// 3. Background cleanup of expired temporary data on its own cadence
    pub fn update(&mut self, frame_time_budget_ms: f64) -> MemoryUpdate {
        let mut result = MemoryUpdate {
            collection: self
                .collector
                .collect(&mut self.table, frame_time_budget_ms, self.clock.as_ref()),
            ..MemoryUpdate::default()
        };

        let now = self.clock.now();
        if let Some(event) = self.monitor.poll(now, self.sampler.as_mut()) {
            result.pressure = Some(event);
            let (evicted, bytes) = self.respond(event);
            result.evicted += evicted;
            result.evicted_bytes += bytes;
        }

        if now.saturating_sub(self.last_cleanup) >= self.config.cleanup_interval {
            self.last_cleanup = now;
            let (evicted, bytes) = self.cleanup_expired();
            result.evicted += evicted;
            result.evicted_bytes += bytes;
        }

        result
    }

    fn respond(&mut self, event: PressureEvent) -> (usize, u64) {
        match event {
            PressureEvent::Warning { fraction } => {
                tracing::warn!(fraction, "Memory pressure warning");
                let evicted = self.evict_where(|record, _| {
                    matches!(record.priority, MemoryPriority::Low | MemoryPriority::Temporary)
                });
                self.collector.collect(
                    &mut self.table,
                    self.config.warning_collect_budget_ms,
                    self.clock.as_ref(),
                );
                evicted
            }
            PressureEvent::Critical { fraction } => {
                tracing::warn!(fraction, "Memory pressure critical");
                let window = self.config.recent_access_window;
                let evicted = self.evict_where(|record, now| match record.priority {
                    MemoryPriority::Critical => false,
                    MemoryPriority::Medium => now.saturating_sub(record.last_access) > window,
                    MemoryPriority::High | MemoryPriority::Low | MemoryPriority::Temporary => true,
                });
                self.force_full_collection();
                evicted
            }
            PressureEvent::Recovered { fraction } => {
                tracing::info!(fraction, "Memory pressure recovered");
                (0, 0)
            }
        }
    }

    fn cleanup_expired(&mut self) -> (usize, u64) {
        let max_age = self.config.temporary_max_age;
        self.evict_where(|record, now| {
            record.priority == MemoryPriority::Temporary
                && now.saturating_sub(record.created) > max_age
        })
    }

    // =========================================================================
    // EVICTION
    // =========================================================================

    /// Evicts every record matching `predicate`, running release hooks.
    ///
    /// The predicate receives the record and the current time.
    fn evict_where<P>(&mut self, predicate: P) -> (usize, u64)
    where
        P: Fn(&AllocationRecord, Duration) -> bool,
    {
        let now = self.clock.now();
        let victims: Vec<AllocationId> = self
            .table
            .values()
            .filter(|record| predicate(record, now))
            .map(|record| record.id)
            .collect();

        let mut bytes = 0;
        for id in &victims {
            if let Some(mut record) = self.table.remove(id) {
                bytes += record.size;
                if let Some(release) = record.release.take() {
                    release();
                }
            }
        }
        if !victims.is_empty() {
            tracing::debug!(count = victims.len(), bytes, "Evicted allocations");
        }
        self.evicted_total += victims.len() as u64;
        (victims.len(), bytes)
    }

    /// Evicts every record with one of the given priorities.
    pub fn evict_priorities(&mut self, priorities: &[MemoryPriority]) -> (usize, u64) {
        self.evict_where(|record, _| priorities.contains(&record.priority))
    }

    /// Unconditional sweep of every generation.
    pub fn force_full_collection(&mut self) -> CollectionReport {
        self.collector.collect_full(&mut self.table, self.clock.as_ref())
    }

    /// Evicts Low/Temporary allocations tagged for a different screen.
    ///
    /// Untagged allocations are left alone.
    pub fn optimize_for_screen(&mut self, screen: &str) -> usize {
        let (evicted, bytes) = self.evict_where(|record, _| {
            matches!(record.priority, MemoryPriority::Low | MemoryPriority::Temporary)
                && record
                    .metadata
                    .get(SCREEN_METADATA_KEY)
                    .is_some_and(|tagged| tagged != screen)
        });
        tracing::debug!(screen, evicted, bytes, "Screen optimization complete");
        evicted
    }

    /// Full usage report.
    #[must_use]
    pub fn report(&self) -> MemoryReport {
        let mut report = MemoryReport {
            total_bytes: 0,
            allocation_count: self.table.len(),
            by_type: [UsageBucket::default(); MemoryType::COUNT],
            by_priority: [UsageBucket::default(); MemoryPriority::COUNT],
            pressure: self.monitor.level(),
            last_sample: self.monitor.last_sample(),
            collector: self.collector.stats(),
            evicted_total: self.evicted_total,
        };
        for record in self.table.values() {
            report.total_bytes += record.size;
            let by_type = &mut report.by_type[record.id.kind().index()];
            by_type.count += 1;
            by_type.bytes += record.size;
            let by_priority = &mut report.by_priority[record.priority.index()];
            by_priority.count += 1;
            by_priority.bytes += record.size;
        }
        report
    }
}
