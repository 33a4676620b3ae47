//! Parallel batch runner
//!
//! Processes independent `(location, elevation)` units on a bounded rayon
//! pool. Each unit fetches its series, loads the persisted summary, runs the
//! assessment and writes the summary back. Nothing a unit does can abort
//! the batch: errors and panics become that unit's outcome.

use crate::assess::Assessor;
use crate::models::{ElevationLevel, Location, ScoreResult, SnowSummary, SummaryKey};
use crate::summary::{SummaryStore, Transition};
use crate::weather::WeatherSource;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One unit of work
#[derive(Debug, Clone)]
pub struct BatchUnit {
    pub location: Location,
    pub elevation: ElevationLevel,
}

impl BatchUnit {
    pub fn new(location: Location, elevation: ElevationLevel) -> Self {
        Self { location, elevation }
    }

    pub fn key(&self) -> SummaryKey {
        SummaryKey::new(self.location.id.clone(), self.elevation)
    }

    /// All three elevation bands of every location
    pub fn expand(locations: &[Location]) -> Vec<BatchUnit> {
        locations
            .iter()
            .flat_map(|loc| {
                ElevationLevel::ALL
                    .iter()
                    .map(move |&level| BatchUnit::new(loc.clone(), level))
            })
            .collect()
    }
}

/// What happened to one unit
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Assessed {
        result: ScoreResult,
        transition: Transition,
        /// True when the updated summary reached the store
        persisted: bool,
    },
    Failed {
        error: String,
    },
    /// Not started: the time budget ran out
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub location_id: String,
    pub elevation: ElevationLevel,
    pub outcome: UnitOutcome,
    pub duration_ms: u64,
}

/// Per-unit outcomes and totals
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
    pub assessed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl BatchReport {
    fn from_units(units: Vec<UnitReport>, duration: Duration) -> Self {
        let mut report = BatchReport {
            duration_ms: duration.as_millis() as u64,
            ..Default::default()
        };
        for unit in &units {
            match unit.outcome {
                UnitOutcome::Assessed { .. } => report.assessed += 1,
                UnitOutcome::Failed { .. } => report.failed += 1,
                UnitOutcome::Skipped => report.skipped += 1,
            }
        }
        report.units = units;
        report
    }

    pub fn total(&self) -> usize {
        self.units.len()
    }
}

/// Wall-clock budget for a batch
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    pub total: Duration,
    /// Stop dispatching new units when less than this remains
    pub safety_margin: Duration,
}

/// Called after each unit with (unit, completed, total)
pub type ProgressCallback = Box<dyn Fn(&UnitReport, usize, usize) + Send + Sync>;

pub struct BatchRunner {
    pool: rayon::ThreadPool,
    workers: usize,
    assessor: Assessor,
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn SummaryStore>,
    budget: Option<TimeBudget>,
    progress_callback: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(
        workers: usize,
        assessor: Assessor,
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn SummaryStore>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("snowcast-worker-{}", i))
            .build()?;
        Ok(Self {
            pool,
            workers,
            assessor,
            source,
            store,
            budget: None,
            progress_callback: None,
        })
    }

    pub fn with_budget(mut self, budget: Option<TimeBudget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every unit, assessing at the current time
    pub fn run(&self, units: &[BatchUnit]) -> BatchReport {
        self.run_at(units, Utc::now())
    }

    /// Run every unit, assessing at `now`
    pub fn run_at(&self, units: &[BatchUnit], now: DateTime<Utc>) -> BatchReport {
        let started = Instant::now();

        // One writer per key per cycle
        let mut seen = HashSet::new();
        let units: Vec<&BatchUnit> = units
            .iter()
            .filter(|unit| {
                let fresh = seen.insert(unit.key());
                if !fresh {
                    warn!("Dropping duplicate unit {}", unit.key());
                }
                fresh
            })
            .collect();

        info!("Batch: {} units on {} workers", units.len(), self.workers);

        let completed = AtomicUsize::new(0);
        let total = units.len();

        let reports: Vec<UnitReport> = self.pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    let report = if self.budget_exhausted(started) {
                        debug!("Skipping {}: time budget exhausted", unit.key());
                        UnitReport {
                            location_id: unit.location.id.clone(),
                            elevation: unit.elevation,
                            outcome: UnitOutcome::Skipped,
                            duration_ms: 0,
                        }
                    } else {
                        self.run_unit(unit, now)
                    };

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(&report, done, total);
                    }
                    report
                })
                .collect()
        });

        let report = BatchReport::from_units(reports, started.elapsed());
        info!(
            "Batch done in {}ms: {} assessed, {} failed, {} skipped",
            report.duration_ms, report.assessed, report.failed, report.skipped
        );
        report
    }

    fn budget_exhausted(&self, started: Instant) -> bool {
        match self.budget {
            Some(budget) => budget.total.saturating_sub(started.elapsed()) < budget.safety_margin,
            None => false,
        }
    }

    /// Run a single unit with panic containment and timing
    fn run_unit(&self, unit: &BatchUnit, now: DateTime<Utc>) -> UnitReport {
        let key = unit.key();
        let start = Instant::now();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.process(unit, &key, now)));

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(message)) => {
                warn!("Unit {} failed: {}", key, message);
                UnitOutcome::Failed { error: message }
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!("Unit {} panicked: {}", key, panic_msg);
                UnitOutcome::Failed {
                    error: format!("Panic: {}", panic_msg),
                }
            }
        };

        UnitReport {
            location_id: key.location_id,
            elevation: key.elevation,
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn process(&self, unit: &BatchUnit, key: &SummaryKey, now: DateTime<Utc>) -> Result<UnitOutcome, String> {
        let elevation_m = unit.location.elevation_m(unit.elevation);

        let series = self
            .source
            .fetch(&unit.location, elevation_m)
            .map_err(|e| format!("fetch failed: {}", e))?;

        // A failed read still yields an assessment, but the write is skipped
        let (persisted, writable) = match self.store.get_or_create(key, now) {
            Ok(summary) => (summary, true),
            Err(e) => {
                warn!("Summary read failed for {}, using defaults: {}", key, e);
                (SnowSummary::new(now), false)
            }
        };

        let assessment = self.assessor.assess(key, &series, &persisted, elevation_m, now);

        let mut written = false;
        if assessment.persist && writable {
            match self.store.put(key, &assessment.summary) {
                Ok(()) => written = true,
                Err(e) => warn!("Summary write failed for {}: {}", key, e),
            }
        }

        Ok(UnitOutcome::Assessed {
            result: assessment.result,
            transition: assessment.transition,
            persisted: written,
        })
    }
}
