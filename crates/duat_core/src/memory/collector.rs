//! # Incremental Collector
//!
//! Sweeps the allocation table for records whose owners are gone.
//!
//! ```text
//!   budget ──────────────────────────────────────────────►
//!   │ gen 0 (always) │ gen 1 (if < 50% used) │ gen 2 (if < 30% used) │
//! ```
//!
//! The cheapest generation runs first; each more expensive generation runs
//! only if the time already spent leaves room for it. Survivors are promoted,
//! so long-lived records stop costing the cheap sweep.

use super::allocation::{AllocationId, AllocationRecord, Generation};
use crate::time::Clock;
use std::collections::BTreeMap;
use std::time::Duration;

/// Fraction of the budget that may be spent before gen 1 is skipped.
const MIDDLE_GENERATION_BUDGET: f64 = 0.5;

/// Fraction of the budget that may be spent before gen 2 is skipped.
const OLD_GENERATION_BUDGET: f64 = 0.3;

/// Outcome of one collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectionReport {
    /// Which generations were swept
    pub generations_run: [bool; Generation::COUNT],
    /// Records removed because their owner is gone
    pub reclaimed: usize,
    /// Bytes those records accounted for
    pub reclaimed_bytes: u64,
    /// Time spent (milliseconds)
    pub elapsed_ms: f64,
    /// Was this an unconditional full collection?
    pub full: bool,
}

impl CollectionReport {
    /// Number of generations swept.
    #[must_use]
    pub fn generations_swept(&self) -> usize {
        self.generations_run.iter().filter(|ran| **ran).count()
    }
}

/// Cumulative collector statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectorStats {
    /// Passes run
    pub passes: u64,
    /// Sweeps per generation
    pub generation_runs: [u64; Generation::COUNT],
    /// Generations skipped for lack of budget
    pub budget_skips: u64,
    /// Records reclaimed
    pub reclaimed: u64,
    /// Bytes reclaimed
    pub reclaimed_bytes: u64,
    /// Duration of the last pass (milliseconds)
    pub last_pass_ms: f64,
}

/// Time-boxed generational sweeper.
#[derive(Debug, Default)]
pub struct IncrementalCollector {
    stats: CollectorStats,
}

impl IncrementalCollector {
    /// Creates a collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> CollectorStats {
        self.stats
    }

    /// Runs one pass bounded by `budget_ms`.
    pub(crate) fn collect(
        &mut self,
        table: &mut BTreeMap<AllocationId, AllocationRecord>,
        budget_ms: f64,
        clock: &dyn Clock,
    ) -> CollectionReport {
        let start = clock.now();
        let budget = budget_ms.max(0.0);
        let mut report = CollectionReport::default();

        self.sweep(table, Generation::Young, &mut report);

        if elapsed_ms(clock, start) < budget * MIDDLE_GENERATION_BUDGET {
            self.sweep(table, Generation::Middle, &mut report);
        } else {
            self.stats.budget_skips += 1;
        }

        if elapsed_ms(clock, start) < budget * OLD_GENERATION_BUDGET {
            self.sweep(table, Generation::Old, &mut report);
        } else {
            self.stats.budget_skips += 1;
        }

        self.finish(report, clock, start)
    }

    /// Sweeps every generation regardless of budget.
    pub(crate) fn collect_full(
        &mut self,
        table: &mut BTreeMap<AllocationId, AllocationRecord>,
        clock: &dyn Clock,
    ) -> CollectionReport {
        let start = clock.now();
        let mut report = CollectionReport {
            full: true,
            ..CollectionReport::default()
        };
        for generation in [Generation::Young, Generation::Middle, Generation::Old] {
            self.sweep(table, generation, &mut report);
        }
        self.finish(report, clock, start)
    }

    fn sweep(
        &mut self,
        table: &mut BTreeMap<AllocationId, AllocationRecord>,
        generation: Generation,
        report: &mut CollectionReport,
    ) {
        // Records promoted earlier in this pass wait for the next one
        let pass = self.stats.passes + 1;
        let before = table.len();
        let mut bytes = 0;
        table.retain(|_, record| {
            if record.generation != generation || record.swept_pass == pass {
                return true;
            }
            if record.is_alive() {
                record.generation = generation.promoted();
                record.swept_pass = pass;
                true
            } else {
                bytes += record.size;
                false
            }
        });

        let reclaimed = before - table.len();
        report.generations_run[generation as usize] = true;
        report.reclaimed += reclaimed;
        report.reclaimed_bytes += bytes;
        self.stats.generation_runs[generation as usize] += 1;
    }

    fn finish(
        &mut self,
        mut report: CollectionReport,
        clock: &dyn Clock,
        start: Duration,
    ) -> CollectionReport {
        report.elapsed_ms = elapsed_ms(clock, start);
        self.stats.passes += 1;
        self.stats.reclaimed += report.reclaimed as u64;
        self.stats.reclaimed_bytes += report.reclaimed_bytes;
        self.stats.last_pass_ms = report.elapsed_ms;
        if report.reclaimed > 0 {
            tracing::debug!(
                reclaimed = report.reclaimed,
                bytes = report.reclaimed_bytes,
                elapsed_ms = report.elapsed_ms,
                "Collection pass complete"
            );
        }
        report
    }
}

fn elapsed_ms(clock: &dyn Clock, start: Duration) -> f64 {
    clock.now().saturating_sub(start).as_secs_f64() * 1000.0
}
