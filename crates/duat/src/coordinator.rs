//! # Performance Coordinator
//!
//! Owns every subsystem and drives them through one frame.
//!
//! ```text
//! begin_frame ──> [Assets]    drain finished loads → cache + memory tracker
//!      │
//! update(dt) ───> [Particles] pool update, grid rebuild
//!      │          [Memory]    cache maintain, incremental collection,
//!      │                      pressure sampling, eviction notices
//! render ───────> [Render]    cull through the grid, draw
//!      │
//! end_frame ────> profiler close → quality evaluation → alerts
//!                 → emergency / periodic optimization → events
//! ```
//!
//! Emergency optimization is a one-shot override: it caps live particles,
//! drops every unprotected cache entry, forces a full collection and
//! restarts the quality controller's stability timer. It never moves the
//! tier; the controller does that on its own evidence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use duat_core::{
    AllocationId, MemoryConfig, MemoryManager, MemoryPriority, MemorySampler, MemoryType,
    PressureLevel, SharedClock, SystemClock, SystemMemorySampler, SCREEN_METADATA_KEY,
};
use duat_rendering::assets::{processed_load, LoadCallback, LoaderStats};
use duat_rendering::pipeline::{
    CacheSection, MemorySection, ParticleSection, ProfileCategory, StageBreakdown,
};
use duat_rendering::{
    AssetCache, AssetKey, AssetSource, AssetType, BackgroundLoader, ChangeReason, CpuMonitor,
    DirectorySource, EntryMetadata, FrameCounters, FrameProfile, FrameProfiler, FrameStage,
    HardwareProfile, LoadRequest, Particle, ParticleEngine, ParticleEngineConfig,
    PerformanceReport, PreloadPlan, ProfilerConfig, QualityChange, QualityController,
    QualityControllerConfig, QualityPreferences, RegressionDetector, RenderTarget, Submission,
    Surface,
};
use duat_shared::{DuatResult, PerformanceAlert, QualityLevel, Rect, ResourceConfig};

use crate::events::{EngineEvent, EventBus, EventReceiver, EventSender, DEFAULT_EVENT_CAPACITY};
use crate::screen::ScreenType;

/// Live particles left after an emergency optimization.
pub const EMERGENCY_PARTICLE_CAP: usize = 500;

/// Periodic optimization never lowers the particle cap below this.
pub const MIN_PARTICLE_CAP: usize = 500;

/// Time between periodic optimizations.
pub const OPTIMIZATION_INTERVAL: Duration = Duration::from_secs(5);

const CAP_STEP_DOWN: usize = 200;
const CAP_STEP_UP: usize = 100;

/// Frames averaged by the periodic optimization.
const OPTIMIZATION_WINDOW: usize = 300;

/// Frames between CPU samples.
const CPU_SAMPLE_EVERY: u64 = 60;

/// Share of the frame budget handed to the incremental collector.
const COLLECT_BUDGET_SHARE: f64 = 0.1;

const BYTES_PER_MB: u64 = 1024 * 1024;

// =============================================================================
// FRAME RESULTS
// =============================================================================

/// What an emergency optimization did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmergencyReport {
    /// Particles released.
    pub particles_released: usize,
    /// Unprotected cache entries dropped.
    pub cache_entries_dropped: usize,
    /// Tracker records reclaimed by the full collection.
    pub records_reclaimed: usize,
    /// Bytes those records accounted for.
    pub bytes_reclaimed: u64,
}

/// Everything one frame produced.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    /// The closed frame.
    pub profile: FrameProfile,
    /// Alerts raised while closing it.
    pub alerts: Vec<PerformanceAlert>,
    /// Tier change, if the controller moved.
    pub quality_change: Option<QualityChange>,
    /// Emergency optimization, if one ran.
    pub emergency: Option<EmergencyReport>,
    /// Finished loads applied at the start of the frame.
    pub loads_applied: usize,
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builds a [`PerformanceCoordinator`].
///
/// Everything except the configuration has a production default: the system
/// clock, the `sysinfo` memory sampler, assets under `./assets`, hardware
/// detection and CPU sampling.
pub struct CoordinatorBuilder {
    config: ResourceConfig,
    clock: Option<SharedClock>,
    sampler: Option<Box<dyn MemorySampler>>,
    source: Option<Arc<dyn AssetSource>>,
    preloads: PreloadPlan,
    initial_quality: Option<QualityLevel>,
    detect_hardware: bool,
    sample_cpu: bool,
    event_capacity: usize,
}

impl CoordinatorBuilder {
    /// Starts from `config`.
    #[must_use]
    pub fn new(config: ResourceConfig) -> Self {
        Self {
            config,
            clock: None,
            sampler: None,
            source: None,
            preloads: PreloadPlan::new(),
            initial_quality: None,
            detect_hardware: true,
            sample_cpu: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Time source shared by every subsystem.
    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where system memory readings come from.
    #[must_use]
    pub fn memory_sampler(mut self, sampler: Box<dyn MemorySampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Where asset bytes come from.
    #[must_use]
    pub fn asset_source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Assets to request when a screen is entered.
    #[must_use]
    pub fn preloads(mut self, plan: PreloadPlan) -> Self {
        self.preloads = plan;
        self
    }

    /// Starting tier. Wins over stored preferences and hardware detection.
    #[must_use]
    pub fn initial_quality(mut self, level: QualityLevel) -> Self {
        self.initial_quality = Some(level);
        self
    }

    /// Probe the machine for a starting tier.
    #[must_use]
    pub fn detect_hardware(mut self, enabled: bool) -> Self {
        self.detect_hardware = enabled;
        self
    }

    /// Sample CPU load into frame profiles.
    #[must_use]
    pub fn sample_cpu(mut self, enabled: bool) -> Self {
        self.sample_cpu = enabled;
        self
    }

    /// Event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validates the configuration and starts every subsystem.
    ///
    /// # Errors
    ///
    /// [`duat_shared::DuatError::InvalidConfig`] for an invalid configuration, or
    /// the loader's error if its workers cannot be spawned.
    pub fn build(self) -> DuatResult<PerformanceCoordinator> {
        self.config.validate()?;
        let config = self.config;
        let clock = self.clock.unwrap_or_else(SystemClock::shared);

        let preferences = config.preferences_path.as_ref().and_then(|path| {
            match QualityPreferences::load(path) {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(%err, path = %path.display(), "Ignoring unreadable quality preferences");
                    None
                }
            }
        });
        let hardware = self.detect_hardware.then(HardwareProfile::detect);

        let level = self
            .initial_quality
            .or_else(|| preferences.as_ref().map(|p| p.quality_level))
            .or_else(|| hardware.map(|h| h.tier.recommended_level()))
            .unwrap_or(QualityLevel::High);
        let auto_adjust = match (&preferences, self.initial_quality) {
            (Some(prefs), None) => prefs.auto_adjust,
            _ => config.auto_quality_adjust,
        };

        let quality = QualityController::new(
            QualityControllerConfig {
                auto_adjust,
                ..QualityControllerConfig::from_resource(&config)
            },
            level,
            Arc::clone(&clock),
        );

        let mut particles = ParticleEngine::new(ParticleEngineConfig::from_resource(&config));
        particles.apply_quality(quality.settings());

        let loader = BackgroundLoader::new(config.worker_thread_count)?;

        let sampler = self
            .sampler
            .unwrap_or_else(|| Box::new(SystemMemorySampler::new()));
        let mut memory = MemoryManager::new(MemoryConfig::from_resource(&config), Arc::clone(&clock), sampler);
        let pool_bytes = (config.max_particles * std::mem::size_of::<Particle>()) as u64;
        memory.track_manual(MemoryType::Particle, pool_bytes, MemoryPriority::Critical);

        let budget = config
            .cache_budget_bytes()
            .min(quality.settings().memory_budget_bytes());
        let cache = AssetCache::new(budget, Arc::clone(&clock));
        let profiler = FrameProfiler::new(ProfilerConfig::from_resource(&config), Arc::clone(&clock));

        let source = self
            .source
            .unwrap_or_else(|| Arc::new(DirectorySource::new("assets")));
        let bus = EventBus::new(self.event_capacity);
        let events = bus.sender();
        let (evictions_tx, evictions_rx) = unbounded();
        let started_at = clock.now();

        tracing::info!(
            level = %level,
            auto_adjust,
            hardware = hardware.map_or("unknown", |h| h.tier.as_str()),
            workers = config.worker_thread_count,
            cache_budget_mb = budget / BYTES_PER_MB,
            "Performance coordinator ready"
        );

        Ok(PerformanceCoordinator {
            config,
            clock,
            particles,
            cache,
            loader,
            source,
            preloads: self.preloads,
            quality,
            memory,
            profiler,
            regressions: RegressionDetector::new(),
            cpu: self.sample_cpu.then(CpuMonitor::new),
            last_cpu: None,
            hardware,
            bus,
            events,
            evictions_tx,
            evictions_rx,
            tracked_assets: HashMap::new(),
            screen: None,
            started_at,
            last_optimization: started_at,
            last_draw_calls: 0,
            emergency_count: 0,
        })
    }
}

impl std::fmt::Debug for CoordinatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorBuilder")
            .field("config", &self.config)
            .field("initial_quality", &self.initial_quality)
            .field("detect_hardware", &self.detect_hardware)
            .field("sample_cpu", &self.sample_cpu)
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// The resource manager. One per process, owned by the frame loop.
pub struct PerformanceCoordinator {
    config: ResourceConfig,
    clock: SharedClock,

    particles: ParticleEngine,
    cache: AssetCache,
    loader: BackgroundLoader,
    source: Arc<dyn AssetSource>,
    preloads: PreloadPlan,
    quality: QualityController,
    memory: MemoryManager,
    profiler: FrameProfiler,
    regressions: RegressionDetector,

    cpu: Option<CpuMonitor>,
    last_cpu: Option<f32>,
    hardware: Option<HardwareProfile>,

    bus: EventBus,
    events: EventSender,

    /// Release hooks of evicted asset records report here.
    evictions_tx: Sender<(AssetKey, AllocationId)>,
    evictions_rx: Receiver<(AssetKey, AllocationId)>,
    /// Tracker record behind each cached asset.
    tracked_assets: HashMap<AssetKey, AllocationId>,

    screen: Option<ScreenType>,
    started_at: Duration,
    last_optimization: Duration,
    last_draw_calls: u32,
    emergency_count: u64,
}

impl PerformanceCoordinator {
    /// Coordinator with every production default.
    ///
    /// # Errors
    ///
    /// See [`CoordinatorBuilder::build`].
    pub fn new(config: ResourceConfig) -> DuatResult<Self> {
        CoordinatorBuilder::new(config).build()
    }

    // =========================================================================
    // FRAME LOOP
    // =========================================================================

    /// Opens a frame and applies every load finished since the last one.
    /// Returns how many were applied.
    pub fn begin_frame(&mut self) -> usize {
        self.profiler.start_frame();
        let started = self.clock.now();
        let applied = self.apply_completed_loads();
        self.charge(FrameStage::Assets, started);
        applied
    }

    /// Advances particles by `dt` seconds, then runs memory housekeeping.
    pub fn update(&mut self, dt: f32) {
        let particles = &mut self.particles;
        self.profiler
            .time_stage(FrameStage::Particles, || particles.update(dt));

        let started = self.clock.now();
        self.cache.maintain();
        let collect_budget = f64::from(self.quality.frame_budget_ms()) * COLLECT_BUDGET_SHARE;
        let update = self.memory.update(collect_budget);
        if let Some(event) = update.pressure {
            self.events.send(EngineEvent::MemoryPressure(event));
        }
        self.drop_evicted_assets();
        self.charge(FrameStage::Memory, started);
    }

    /// Draws particles inside `camera` (everything if `None`). Returns draw
    /// calls issued.
    pub fn render(&mut self, target: &mut dyn RenderTarget, camera: Option<Rect>) -> u32 {
        let particles = &mut self.particles;
        let draw_calls = self
            .profiler
            .time_stage(FrameStage::Render, || particles.render(target, camera));
        self.last_draw_calls = self.last_draw_calls.saturating_add(draw_calls);
        draw_calls
    }

    /// Closes the frame: profile, quality evaluation, alert handling and
    /// periodic optimization.
    ///
    /// At most one emergency optimization runs per frame.
    pub fn end_frame(&mut self) -> FrameOutcome {
        let counters = FrameCounters {
            particle_count: self.particles.active_count(),
            draw_calls: std::mem::take(&mut self.last_draw_calls),
            memory: self.memory.last_sample(),
            cpu_usage: self.sample_cpu(),
        };
        let (profile, alerts) = self.profiler.end_frame(counters);
        self.regressions.observe(profile.frame_time_ms);

        let started = self.clock.now();
        #[allow(clippy::cast_possible_truncation)]
        self.quality.record_frame(profile.frame_time_ms as f32);
        let quality_change = self.quality.update();
        if let Some(change) = quality_change {
            self.on_quality_change(change);
        }
        let quality_ms = self.clock.now().saturating_sub(started).as_secs_f64() * 1000.0;
        self.profiler
            .record_metric("quality_eval_ms", ProfileCategory::Quality, quality_ms);

        let mut emergency = None;
        for alert in alerts.iter().copied() {
            if emergency.is_some() && alert.kind.is_emergency() {
                self.events.send(EngineEvent::PerformanceAlert(alert));
                continue;
            }
            if let Some(report) = self.handle_alert(alert) {
                emergency = Some(report);
            }
        }

        self.maybe_optimize();

        FrameOutcome {
            profile,
            alerts,
            quality_change,
            emergency,
            loads_applied: 0,
        }
    }

    /// `begin_frame`, `update`, `render`, `end_frame`.
    pub fn run_frame(
        &mut self,
        dt: f32,
        target: &mut dyn RenderTarget,
        camera: Option<Rect>,
    ) -> FrameOutcome {
        let loads_applied = self.begin_frame();
        self.update(dt);
        self.render(target, camera);
        FrameOutcome {
            loads_applied,
            ..self.end_frame()
        }
    }

    fn charge(&mut self, stage: FrameStage, since: Duration) {
        let ms = self.clock.now().saturating_sub(since).as_secs_f64() * 1000.0;
        self.profiler.record_stage(stage, ms);
    }

    fn sample_cpu(&mut self) -> Option<f32> {
        let monitor = self.cpu.as_mut()?;
        if self.profiler.frame_number() % CPU_SAMPLE_EVERY == 1 {
            self.last_cpu = Some(monitor.sample());
        }
        self.last_cpu
    }

    // =========================================================================
    // ALERTS & OPTIMIZATION
    // =========================================================================

    /// Forwards `alert` to listeners and runs an emergency optimization if
    /// its kind demands one.
    pub fn handle_alert(&mut self, alert: PerformanceAlert) -> Option<EmergencyReport> {
        self.events.send(EngineEvent::PerformanceAlert(alert));
        if !alert.kind.is_emergency() {
            tracing::info!(
                kind = %alert.kind,
                frame = alert.frame_number,
                value = alert.value,
                "Advisory performance alert"
            );
            return None;
        }
        tracing::warn!(
            kind = %alert.kind,
            frame = alert.frame_number,
            value = alert.value,
            threshold = alert.threshold,
            "Emergency optimization triggered"
        );
        Some(self.emergency_optimize())
    }

    /// Sheds load immediately. Does not change the quality tier.
    pub fn emergency_optimize(&mut self) -> EmergencyReport {
        let particles_released = self.particles.cap_active(EMERGENCY_PARTICLE_CAP);
        let cache_entries_dropped = self.cache.clear(true);
        self.forget_uncached_assets();
        let collection = self.memory.force_full_collection();
        self.drop_evicted_assets();
        self.quality.reset_upgrade_timer();
        self.emergency_count += 1;

        let report = EmergencyReport {
            particles_released,
            cache_entries_dropped,
            records_reclaimed: collection.reclaimed,
            bytes_reclaimed: collection.reclaimed_bytes,
        };
        tracing::warn!(
            particles_released,
            cache_entries_dropped,
            records_reclaimed = report.records_reclaimed,
            count = self.emergency_count,
            "Emergency optimization complete"
        );
        self.events.send(EngineEvent::EmergencyOptimization {
            particles_released,
            cache_entries_dropped,
        });
        report
    }

    /// Nudges the particle cap toward the frame-rate target, at most once
    /// per [`OPTIMIZATION_INTERVAL`].
    fn maybe_optimize(&mut self) {
        let now = self.clock.now();
        if now.saturating_sub(self.last_optimization) < OPTIMIZATION_INTERVAL {
            return;
        }
        self.last_optimization = now;

        let Some(summary) = self.profiler.summary(OPTIMIZATION_WINDOW) else {
            return;
        };
        let target = f64::from(self.quality.target_fps());
        let cap = self.particles.max_particles();
        if summary.avg_fps < target * 0.9 {
            let lowered = cap.saturating_sub(CAP_STEP_DOWN).max(MIN_PARTICLE_CAP);
            if lowered < cap {
                self.particles.set_particle_cap(lowered);
                tracing::debug!(from = cap, to = lowered, fps = summary.avg_fps, "Lowered particle cap");
            }
        } else if summary.avg_fps > target * 1.1 {
            self.particles.set_particle_cap(cap + CAP_STEP_UP);
            let raised = self.particles.max_particles();
            if raised > cap {
                tracing::debug!(from = cap, to = raised, fps = summary.avg_fps, "Raised particle cap");
            }
        }
    }

    fn on_quality_change(&mut self, change: QualityChange) {
        let settings = *self.quality.settings();
        self.particles.apply_quality(&settings);
        self.cache.set_budget(self.cache_budget());
        self.forget_uncached_assets();
        self.save_preferences();
        self.events
            .send(EngineEvent::QualityChanged { change, settings });
    }

    /// The smallest of the configured budget, the tier's budget and the
    /// active screen's budget.
    fn cache_budget(&self) -> u64 {
        let budget = self
            .config
            .cache_budget_bytes()
            .min(self.quality.settings().memory_budget_bytes());
        match self.screen {
            Some(screen) => budget.min(screen.target().memory_budget_mb * BYTES_PER_MB),
            None => budget,
        }
    }

    // =========================================================================
    // ASSETS
    // =========================================================================

    /// Returns the cached surface for `key`, or queues a background load and
    /// returns `None`.
    ///
    /// `callback` runs on the frame thread when the load is applied. It is
    /// not invoked on a cache hit.
    pub fn request_asset(
        &mut self,
        key: impl Into<AssetKey>,
        asset_type: AssetType,
        callback: Option<LoadCallback>,
    ) -> Option<Surface> {
        let key = key.into();
        if let Some(surface) = self.cache.get(&key) {
            if let Some(&id) = self.tracked_assets.get(&key) {
                self.memory.touch(id);
            }
            return Some(surface);
        }

        let mut request = LoadRequest::new(key.clone(), asset_type);
        if let Some(screen) = self.screen {
            request = request.on_screen(screen.as_str());
        }
        let load = processed_load(Arc::clone(&self.source), key, asset_type, self.quality.level());
        if self.loader.request_async(request, load, callback) == Submission::Rejected {
            tracing::warn!("Asset request rejected after shutdown");
        }
        None
    }

    /// Pins `key` in the cache. False if it is not cached.
    pub fn protect_asset(&mut self, key: &AssetKey) -> bool {
        self.cache.protect(key)
    }

    /// Unpins `key`. False if it is not cached.
    pub fn unprotect_asset(&mut self, key: &AssetKey) -> bool {
        self.cache.unprotect(key)
    }

    fn apply_completed_loads(&mut self) -> usize {
        let completed = self.loader.drain_completed();
        let applied = completed.len();
        for mut load in completed {
            if let Ok(surface) = &load.result {
                self.admit(&load.key, load.asset_type, load.screen.as_deref(), surface.clone());
            }
            load.dispatch();
            self.events.send(EngineEvent::AssetLoaded {
                key: load.key,
                asset_type: load.asset_type,
                result: load.result,
            });
        }
        applied
    }

    /// Caches a loaded surface and registers its pixels with the memory
    /// tracker. Evicting the record from the tracker drops the cache entry
    /// unless it is protected.
    fn admit(&mut self, key: &AssetKey, asset_type: AssetType, screen: Option<&str>, surface: Surface) {
        let id = self.memory.track(
            surface.buffer(),
            asset_type.memory_type(),
            surface.byte_size(),
            asset_type.memory_priority(),
        );
        if let Some(screen) = screen {
            self.memory.set_metadata(id, SCREEN_METADATA_KEY, screen);
        }
        let notices = self.evictions_tx.clone();
        let hook_key = key.clone();
        self.memory.set_release_hook(id, move || {
            let _ = notices.send((hook_key, id));
        });
        if let Some(previous) = self.tracked_assets.insert(key.clone(), id) {
            self.memory.untrack(previous);
        }

        let mut metadata = EntryMetadata::for_type(asset_type);
        if let Some(screen) = screen {
            metadata = metadata.on_screen(screen);
        }
        let evicted = self.cache.put(key.clone(), surface, metadata);
        if evicted > 0 {
            self.forget_uncached_assets();
        }
    }

    /// Removes cache entries whose tracker record was evicted.
    fn drop_evicted_assets(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok((key, id)) = self.evictions_rx.try_recv() {
            if self.tracked_assets.get(&key) != Some(&id) {
                continue;
            }
            self.tracked_assets.remove(&key);
            let unprotected = self
                .cache
                .entry(&key)
                .is_some_and(|entry| !entry.metadata.protected);
            if unprotected && self.cache.remove(&key).is_some() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped cache entries evicted by the memory manager");
        }
        dropped
    }

    fn forget_uncached_assets(&mut self) {
        let cache = &self.cache;
        self.tracked_assets.retain(|key, _| cache.contains(key));
    }

    // =========================================================================
    // SCREENS
    // =========================================================================

    /// Enters `screen`: clears particles, retunes quality toward the
    /// screen's preferred tier (auto-adjust only), tightens the cache budget,
    /// evicts other screens' low-priority memory and queues preloads.
    ///
    /// Returns the number of preloads queued.
    pub fn set_screen(&mut self, screen: ScreenType) -> usize {
        let from = self.screen.replace(screen);
        self.particles.clear_all();

        let target = screen.target();
        if self.quality.auto_adjust() {
            if let Some(change) = self
                .quality
                .retune(target.preferred_quality, ChangeReason::Screen)
            {
                self.on_quality_change(change);
            }
        }

        self.cache.set_budget(self.cache_budget());
        self.memory.optimize_for_screen(screen.as_str());
        self.drop_evicted_assets();
        self.forget_uncached_assets();

        let queued = self.preloads.schedule(
            screen.as_str(),
            &self.cache,
            &mut self.loader,
            &self.source,
            self.quality.level(),
        );
        tracing::info!(
            from = from.map_or("none", ScreenType::as_str),
            to = %screen,
            quality = %self.quality.level(),
            preloads = queued,
            "Screen changed"
        );
        self.events.send(EngineEvent::ScreenChanged { from, to: screen });
        queued
    }

    /// Active screen.
    #[must_use]
    pub const fn screen(&self) -> Option<ScreenType> {
        self.screen
    }

    /// Preload rules, for adding screens at runtime.
    pub fn preloads_mut(&mut self) -> &mut PreloadPlan {
        &mut self.preloads
    }

    // =========================================================================
    // QUALITY
    // =========================================================================

    /// Fixes the tier and turns automatic adjustment off.
    pub fn set_quality_level(&mut self, level: QualityLevel) -> Option<QualityChange> {
        let change = self.quality.set_quality_level(level);
        match change {
            Some(change) => self.on_quality_change(change),
            None => self.save_preferences(),
        }
        change
    }

    /// Turns automatic adjustment on or off.
    pub fn set_auto_adjust(&mut self, enabled: bool) {
        self.quality.set_auto_adjust(enabled);
        self.save_preferences();
    }

    fn save_preferences(&self) {
        let Some(path) = &self.config.preferences_path else {
            return;
        };
        let preferences = QualityPreferences::new(
            self.quality.level(),
            self.quality.auto_adjust(),
            self.hardware.map(|h| h.tier),
        );
        match preferences.save(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Saved quality preferences"),
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "Failed to save quality preferences");
            }
        }
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    /// Applies a new configuration.
    ///
    /// Cache budget, particle cap, target frame rate, auto-adjust and the
    /// preferences path take effect now. Pool capacity, worker count, screen
    /// size, grid, thresholds, history and seed keep their startup values.
    ///
    /// # Errors
    ///
    /// The validation error; the running configuration is left untouched.
    pub fn apply_config(&mut self, config: ResourceConfig) -> DuatResult<()> {
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "Rejected configuration, keeping the last good one");
            return Err(err);
        }

        self.quality.set_target_fps(config.target_fps);
        self.profiler.set_target_fps(config.target_fps);
        self.quality.set_auto_adjust(config.auto_quality_adjust);
        self.config.cache_budget_mb = config.cache_budget_mb;
        self.config.target_fps = config.target_fps;
        self.config.auto_quality_adjust = config.auto_quality_adjust;
        self.config.preferences_path = config.preferences_path;

        self.particles.set_particle_cap(config.max_particles);
        self.cache.set_budget(self.cache_budget());
        self.forget_uncached_assets();

        tracing::info!(
            cache_budget_mb = self.config.cache_budget_mb,
            target_fps = self.config.target_fps,
            particle_cap = self.particles.max_particles(),
            auto_adjust = self.config.auto_quality_adjust,
            "Configuration applied"
        );
        Ok(())
    }

    /// Configuration in force.
    #[must_use]
    pub const fn config(&self) -> &ResourceConfig {
        &self.config
    }

    // =========================================================================
    // REPORTING & ACCESS
    // =========================================================================

    /// Snapshot of every subsystem.
    #[must_use]
    pub fn report(&self) -> PerformanceReport {
        let cache_stats = self.cache.stats();
        let loader = self.loader.stats();
        let memory = self.memory.report();
        PerformanceReport {
            frames: self.profiler.frame_number(),
            uptime_secs: self.clock.now().saturating_sub(self.started_at).as_secs_f64(),
            quality_level: self.quality.level(),
            auto_adjust: self.quality.auto_adjust(),
            screen: self.screen.map(|s| s.as_str().to_owned()),
            bottleneck: self.profiler.bottleneck(),
            emergency_optimizations: self.emergency_count,
            summary: self.profiler.summary(usize::MAX),
            stages: StageBreakdown::from(&self.profiler.stage_averages(usize::MAX)),
            particles: ParticleSection::from(&self.particles.stats()),
            cache: CacheSection {
                entries: self.cache.len(),
                protected: self.cache.protected_count(),
                current_bytes: self.cache.current_bytes(),
                budget_bytes: self.cache.budget_bytes(),
                hit_rate: cache_stats.hit_rate(),
                evictions: cache_stats.evictions,
                loads_in_flight: loader.in_flight,
                loads_failed: loader.failed,
            },
            memory: MemorySection {
                pressure: pressure_name(memory.pressure).to_owned(),
                allocations: memory.allocation_count,
                tracked_bytes: memory.total_bytes,
                evicted_total: memory.evicted_total,
                collections: memory.collector.passes,
            },
            alerts: self.profiler.alert_counts(),
            regressions: self.regressions.check(),
        }
    }

    /// A receiver for collaborator events. Receivers share one queue.
    #[must_use]
    pub fn events(&self) -> EventReceiver {
        self.bus.receiver()
    }

    /// Events dropped because the channel was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    /// Emergency optimizations so far.
    #[must_use]
    pub const fn emergency_count(&self) -> u64 {
        self.emergency_count
    }

    /// Particle engine.
    #[must_use]
    pub const fn particles(&self) -> &ParticleEngine {
        &self.particles
    }

    /// Particle engine, for spawning.
    pub fn particles_mut(&mut self) -> &mut ParticleEngine {
        &mut self.particles
    }

    /// Asset cache.
    #[must_use]
    pub const fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Asset cache, for direct insertion.
    pub fn cache_mut(&mut self) -> &mut AssetCache {
        &mut self.cache
    }

    /// Loader counters.
    #[must_use]
    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    /// Quality controller.
    #[must_use]
    pub const fn quality(&self) -> &QualityController {
        &self.quality
    }

    /// Memory manager.
    #[must_use]
    pub const fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// Frame profiler.
    #[must_use]
    pub const fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    /// Hardware detected at startup.
    #[must_use]
    pub const fn hardware(&self) -> Option<HardwareProfile> {
        self.hardware
    }

    /// Stops the loader, applies whatever it finished and saves preferences.
    pub fn shutdown(&mut self) {
        for mut load in self.loader.shutdown() {
            load.dispatch();
        }
        self.save_preferences();
        tracing::info!(
            frames = self.profiler.frame_number(),
            emergencies = self.emergency_count,
            "Performance coordinator stopped"
        );
    }
}

impl std::fmt::Debug for PerformanceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceCoordinator")
            .field("screen", &self.screen)
            .field("quality", &self.quality.level())
            .field("particles", &self.particles.active_count())
            .field("cached", &self.cache.len())
            .field("frames", &self.profiler.frame_number())
            .field("emergency_count", &self.emergency_count)
            .finish_non_exhaustive()
    }
}

const fn pressure_name(level: PressureLevel) -> &'static str {
    match level {
        PressureLevel::Normal => "normal",
        PressureLevel::Warning => "warning",
        PressureLevel::Critical => "critical",
    }
}
