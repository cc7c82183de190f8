//! # Background Loader
//!
//! A small pool of worker threads that run asset load functions off the
//! frame loop.
//!
//! ```text
//!   main loop ──request_async──> [priority heap] ──> worker 0..N
//!       ▲                                               │
//!       └────── drain_completed (once per frame) ◄──channel
//! ```
//!
//! The pending map (key → callbacks) lives on the main thread only. Workers
//! never see callbacks; they push `(key, result)` onto a channel that the
//! frame loop drains at a fixed point. A second request for a key already in
//! flight attaches its callback instead of loading twice.
//!
//! There is no mid-flight cancellation. A result nobody wants any more is
//! simply delivered with no callbacks attached.

use std::collections::{BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use duat_shared::{DuatError, DuatResult, MAX_WORKER_THREADS};
use parking_lot::{Condvar, Mutex};

use super::asset_type::{AssetType, LoadPriority};
use super::error::{LoadError, LoadResult};
use super::key::AssetKey;
use super::surface::Surface;

/// Work executed on a loader thread.
pub type LoadFn = Box<dyn FnOnce() -> LoadResult<Surface> + Send>;

/// Completion callback, run on the main thread during dispatch.
pub type LoadCallback = Box<dyn FnOnce(&AssetKey, &LoadResult<Surface>) + Send>;

/// What to load and how urgently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Asset key.
    pub key: AssetKey,
    /// Queue priority.
    pub priority: LoadPriority,
    /// Kind of asset, carried to the completion.
    pub asset_type: AssetType,
    /// Screen the asset is for, carried to the completion.
    pub screen: Option<String>,
}

impl LoadRequest {
    /// Request at the kind's default priority.
    #[must_use]
    pub fn new(key: impl Into<AssetKey>, asset_type: AssetType) -> Self {
        Self {
            key: key.into(),
            priority: asset_type.default_priority(),
            asset_type,
            screen: None,
        }
    }

    /// Overrides the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: LoadPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Tags the request with a screen.
    #[must_use]
    pub fn on_screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }
}

/// Outcome of [`BackgroundLoader::request_async`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new load was queued.
    Submitted,
    /// A load for the key was already in flight; the callback was attached.
    Coalesced,
    /// The loader is shut down; the callback already ran with
    /// [`LoadError::Shutdown`].
    Rejected,
}

/// A finished load, ready to be applied on the main thread.
pub struct CompletedLoad {
    /// Asset key.
    pub key: AssetKey,
    /// Kind of asset.
    pub asset_type: AssetType,
    /// Screen the request was tagged with.
    pub screen: Option<String>,
    /// Decoded surface or the reason there is none.
    pub result: LoadResult<Surface>,
    /// Time from first request to drain.
    pub latency: Duration,
    callbacks: Vec<LoadCallback>,
}

impl CompletedLoad {
    /// Callbacks waiting on this load.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Runs every attached callback in registration order. Returns how many
    /// ran.
    pub fn dispatch(&mut self) -> usize {
        let callbacks = std::mem::take(&mut self.callbacks);
        let count = callbacks.len();
        for callback in callbacks {
            callback(&self.key, &self.result);
        }
        count
    }
}

impl std::fmt::Debug for CompletedLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletedLoad")
            .field("key", &self.key)
            .field("asset_type", &self.asset_type)
            .field("ok", &self.result.is_ok())
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

/// Loader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Loads queued.
    pub submitted: u64,
    /// Requests attached to a load already in flight.
    pub coalesced: u64,
    /// Loads that produced a surface.
    pub completed: u64,
    /// Loads that produced an error.
    pub failed: u64,
    /// Keys currently in flight.
    pub in_flight: usize,
    /// Jobs waiting for a worker.
    pub queue_depth: usize,
    /// Worker threads.
    pub workers: usize,
}

// =============================================================================
// JOB QUEUE (shared with workers)
// =============================================================================

struct Job {
    priority: LoadPriority,
    sequence: u64,
    key: AssetKey,
    load: LoadFn,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    /// Higher priority first, then first come first served.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct QueueState {
    heap: BinaryHeap<Job>,
    shutdown: bool,
}

struct JobQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl JobQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Queues a job. Hands it back if the queue is shut down.
    fn push(&self, job: Job) -> Result<(), Job> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(job);
        }
        state.heap.push(job);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a job is available. `None` once shut down.
    fn pop(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(job) = state.heap.pop() {
                return Some(job);
            }
            self.available.wait(&mut state);
        }
    }

    /// Stops the queue and returns the jobs that never ran.
    fn stop(&self) -> Vec<Job> {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.available.notify_all();
        std::mem::take(&mut state.heap).into_vec()
    }

    fn len(&self) -> usize {
        self.state.lock().heap.len()
    }
}

struct Completion {
    key: AssetKey,
    result: LoadResult<Surface>,
}

struct PendingLoad {
    asset_type: AssetType,
    screen: Option<String>,
    callbacks: Vec<LoadCallback>,
    requested_at: Instant,
}

// =============================================================================
// LOADER
// =============================================================================

/// Priority-ordered, de-duplicating asset loader.
pub struct BackgroundLoader {
    queue: Arc<JobQueue>,
    workers: Vec<JoinHandle<()>>,
    sender: Sender<Completion>,
    completions: Receiver<Completion>,
    pending: HashMap<AssetKey, PendingLoad>,
    next_sequence: u64,
    stats: LoaderStats,
    shut_down: bool,
}

impl BackgroundLoader {
    /// Starts `worker_count` loader threads (clamped to `1..=16`).
    ///
    /// # Errors
    ///
    /// [`DuatError::Io`] if the OS refuses to spawn a thread. Threads
    /// started before the failure are stopped.
    pub fn new(worker_count: usize) -> DuatResult<Self> {
        let count = worker_count.clamp(1, MAX_WORKER_THREADS);
        let (sender, completions) = unbounded();
        let mut loader = Self {
            queue: Arc::new(JobQueue::new()),
            workers: Vec::with_capacity(count),
            sender,
            completions,
            pending: HashMap::new(),
            next_sequence: 0,
            stats: LoaderStats {
                workers: count,
                ..LoaderStats::default()
            },
            shut_down: false,
        };

        for index in 0..count {
            let queue = Arc::clone(&loader.queue);
            let sender = loader.sender.clone();
            let handle = thread::Builder::new()
                .name(format!("duat-loader-{index}"))
                .spawn(move || Self::worker_loop(&queue, &sender))
                .map_err(|e| DuatError::Io(format!("failed to spawn loader thread: {e}")))?;
            loader.workers.push(handle);
        }

        tracing::info!(workers = count, "Background loader started");
        Ok(loader)
    }

    fn worker_loop(queue: &JobQueue, sender: &Sender<Completion>) {
        while let Some(job) = queue.pop() {
            let Job { key, load, .. } = job;
            let result = match panic::catch_unwind(AssertUnwindSafe(load)) {
                Ok(result) => result,
                Err(payload) => Err(LoadError::WorkerPanicked(panic_message(payload.as_ref()))),
            };
            if sender.send(Completion { key, result }).is_err() {
                break;
            }
        }
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Requests an asynchronous load.
    ///
    /// If `request.key` is already in flight, `callback` is attached to that
    /// load and `load` is dropped unrun.
    pub fn request_async<F>(
        &mut self,
        request: LoadRequest,
        load: F,
        callback: Option<LoadCallback>,
    ) -> Submission
    where
        F: FnOnce() -> LoadResult<Surface> + Send + 'static,
    {
        if self.shut_down {
            if let Some(callback) = callback {
                callback(&request.key, &Err(LoadError::Shutdown));
            }
            return Submission::Rejected;
        }

        if let Some(pending) = self.pending.get_mut(&request.key) {
            pending.callbacks.extend(callback);
            self.stats.coalesced += 1;
            tracing::debug!(key = %request.key, "Coalesced load request");
            return Submission::Coalesced;
        }

        let job = Job {
            priority: request.priority,
            sequence: self.next_sequence,
            key: request.key.clone(),
            load: Box::new(load),
        };
        self.next_sequence += 1;

        if let Err(job) = self.queue.push(job) {
            if let Some(callback) = callback {
                callback(&job.key, &Err(LoadError::Shutdown));
            }
            return Submission::Rejected;
        }

        self.pending.insert(
            request.key,
            PendingLoad {
                asset_type: request.asset_type,
                screen: request.screen,
                callbacks: callback.into_iter().collect(),
                requested_at: Instant::now(),
            },
        );
        self.stats.submitted += 1;
        Submission::Submitted
    }

    /// Is a load for `key` in flight?
    #[must_use]
    pub fn is_pending(&self, key: &AssetKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Keys in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // =========================================================================
    // COMPLETIONS
    // =========================================================================

    /// Collects every load finished since the last call. Never blocks.
    ///
    /// Each key leaves the pending map here, before its callbacks can run,
    /// so a callback that re-requests the key starts a fresh load.
    pub fn drain_completed(&mut self) -> Vec<CompletedLoad> {
        let mut done = Vec::new();
        while let Ok(completion) = self.completions.try_recv() {
            if let Some(load) = self.finish(completion) {
                done.push(load);
            }
        }
        done
    }

    /// Drains completions and runs their callbacks. Returns them with
    /// callbacks consumed.
    pub fn dispatch_completed(&mut self) -> Vec<CompletedLoad> {
        let mut done = self.drain_completed();
        for load in &mut done {
            load.dispatch();
        }
        done
    }

    /// Blocks up to `timeout` for at least one completion, then drains.
    /// Meant for tools and tests, not for the frame loop.
    pub fn wait_completed(&mut self, timeout: Duration) -> Vec<CompletedLoad> {
        let mut done = Vec::new();
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => done.extend(self.finish(completion)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return done,
        }
        done.extend(self.drain_completed());
        done
    }

    fn finish(&mut self, completion: Completion) -> Option<CompletedLoad> {
        let Completion { key, result } = completion;
        let pending = self.pending.remove(&key)?;
        match &result {
            Ok(_) => self.stats.completed += 1,
            Err(err) => {
                self.stats.failed += 1;
                tracing::debug!(key = %key, error = %err, "Asset load failed");
            }
        }
        Some(CompletedLoad {
            key,
            asset_type: pending.asset_type,
            screen: pending.screen,
            result,
            latency: pending.requested_at.elapsed(),
            callbacks: pending.callbacks,
        })
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Stops the workers and returns every outstanding load: finished ones
    /// with their result, the rest with [`LoadError::Shutdown`].
    pub fn shutdown(&mut self) -> Vec<CompletedLoad> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;
        let skipped = self.queue.stop().len();
        self.join_workers();

        let mut done = self.drain_completed();
        let stranded: Vec<AssetKey> = self.pending.keys().cloned().collect();
        for key in stranded {
            done.extend(self.finish(Completion {
                key,
                result: Err(LoadError::Shutdown),
            }));
        }
        tracing::info!(skipped, delivered = done.len(), "Background loader stopped");
        done
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Loader worker exited by panic");
            }
        }
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            in_flight: self.pending.len(),
            queue_depth: self.queue.len(),
            ..self.stats
        }
    }
}

impl Drop for BackgroundLoader {
    fn drop(&mut self) {
        let _ = self.queue.stop();
        self.join_workers();
    }
}

impl std::fmt::Debug for BackgroundLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLoader")
            .field("workers", &self.workers.len())
            .field("pending", &self.pending.len())
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
