//! Batch runner tests with in-process weather sources and stores

use chrono::{DateTime, TimeZone, Utc};
use snowcast::assess::Assessor;
use snowcast::batch::{BatchRunner, BatchUnit, TimeBudget, UnitOutcome};
use snowcast::models::{ElevationLevel, HourlySeries, Location, SnowSummary, SummaryKey};
use snowcast::summary::{MemorySummaryStore, RedbSummaryStore, StoreError, SummaryStore};
use snowcast::weather::{FetchError, FetchResult, WeatherSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
}

const HOURS: usize = 96;

fn now() -> DateTime<Utc> {
    start() + chrono::Duration::hours(HOURS as i64 - 1)
}

fn location(id: &str) -> Location {
    Location {
        id: id.to_string(),
        name: id.to_uppercase(),
        latitude: 46.0,
        longitude: 7.5,
        base_elevation_m: 1_000.0,
        mid_elevation_m: 1_800.0,
        top_elevation_m: 2_600.0,
    }
}

/// Cold series with 6cm over the last day; other ids fail or panic
struct FakeSource {
    calls: AtomicUsize,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl WeatherSource for FakeSource {
    fn fetch(&self, location: &Location, _elevation_m: f64) -> FetchResult<HourlySeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match location.id.as_str() {
            "down" => Err(FetchError::Status {
                status: 503,
                message: "maintenance".into(),
            }),
            "boom" => panic!("upstream returned garbage"),
            _ => {
                let mut snow = vec![0.0; HOURS];
                for s in &mut snow[HOURS - 24..] {
                    *s = 0.25;
                }
                Ok(HourlySeries::from_hourly(start(), vec![-7.0; HOURS], snow)?)
            }
        }
    }
}

/// Store whose reads and writes always fail
struct BrokenStore;

impl SummaryStore for BrokenStore {
    fn get(&self, _key: &SummaryKey) -> Result<Option<SnowSummary>, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    fn put(&self, _key: &SummaryKey, _summary: &SnowSummary) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    fn list(&self) -> Result<Vec<(String, SnowSummary)>, StoreError> {
        Ok(Vec::new())
    }
}

fn runner(store: Arc<dyn SummaryStore>) -> BatchRunner {
    BatchRunner::new(4, Assessor::default(), Arc::new(FakeSource::new()), store).unwrap()
}

#[test]
fn test_all_units_assessed_and_persisted() {
    let store = Arc::new(MemorySummaryStore::new());
    let units = BatchUnit::expand(&[location("alpha"), location("beta")]);
    assert_eq!(units.len(), 6);

    let report = runner(store.clone()).run_at(&units, now());

    assert_eq!(report.total(), 6);
    assert_eq!(report.assessed, 6);
    assert_eq!(report.failed, 0);
    assert_eq!(store.len(), 6);

    let summary = store
        .get(&SummaryKey::new("alpha", ElevationLevel::Mid))
        .unwrap()
        .unwrap();
    assert!((summary.snowfall_since_freeze_cm - 6.0).abs() < 1e-9);
    for unit in &report.units {
        assert!(matches!(unit.outcome, UnitOutcome::Assessed { persisted: true, .. }));
    }
}

#[test]
fn test_failures_and_panics_stay_inside_their_unit() {
    let store = Arc::new(MemorySummaryStore::new());
    let units = BatchUnit::expand(&[location("alpha"), location("down"), location("boom")]);

    let report = runner(store.clone()).run_at(&units, now());

    assert_eq!(report.assessed, 3);
    assert_eq!(report.failed, 6);
    for unit in report.units.iter().filter(|u| u.location_id == "boom") {
        match &unit.outcome {
            UnitOutcome::Failed { error } => assert!(error.contains("Panic"), "{}", error),
            other => panic!("expected failure, got {:?}", other),
        }
    }
    for unit in report.units.iter().filter(|u| u.location_id == "down") {
        match &unit.outcome {
            UnitOutcome::Failed { error } => assert!(error.contains("503"), "{}", error),
            other => panic!("expected failure, got {:?}", other),
        }
    }
    assert_eq!(store.len(), 3);
}

#[test]
fn test_broken_store_still_scores() {
    let report = runner(Arc::new(BrokenStore)).run_at(&BatchUnit::expand(&[location("alpha")]), now());

    assert_eq!(report.assessed, 3);
    for unit in &report.units {
        assert!(matches!(unit.outcome, UnitOutcome::Assessed { persisted: false, .. }));
    }
}

#[test]
fn test_exhausted_budget_skips_everything() {
    let budget = TimeBudget {
        total: Duration::ZERO,
        safety_margin: Duration::from_secs(30),
    };
    let source = Arc::new(FakeSource::new());
    let report = BatchRunner::new(2, Assessor::default(), source.clone(), Arc::new(MemorySummaryStore::new()))
        .unwrap()
        .with_budget(Some(budget))
        .run_at(&BatchUnit::expand(&[location("alpha")]), now());

    assert_eq!(report.skipped, 3);
    assert_eq!(report.assessed, 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_duplicate_keys_run_once() {
    let source = Arc::new(FakeSource::new());
    let mut units = BatchUnit::expand(&[location("alpha")]);
    units.push(BatchUnit::new(location("alpha"), ElevationLevel::Top));

    let report = BatchRunner::new(4, Assessor::default(), source.clone(), Arc::new(MemorySummaryStore::new()))
        .unwrap()
        .run_at(&units, now());

    assert_eq!(report.total(), 3);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_progress_callback_sees_every_unit() {
    let seen = Arc::new(AtomicUsize::new(0));
    let last_total = Arc::new(AtomicUsize::new(0));
    let (seen_cb, total_cb) = (seen.clone(), last_total.clone());

    let report = runner(Arc::new(MemorySummaryStore::new()))
        .with_progress_callback(Box::new(move |_unit, _done, total| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
            total_cb.store(total, Ordering::SeqCst);
        }))
        .run_at(&BatchUnit::expand(&[location("alpha"), location("beta")]), now());

    assert_eq!(seen.load(Ordering::SeqCst), report.total());
    assert_eq!(last_total.load(Ordering::SeqCst), 6);
}

#[test]
fn test_second_cycle_with_same_data_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RedbSummaryStore::open(&dir.path().join("summaries.redb")).unwrap());
    let units = BatchUnit::expand(&[location("alpha")]);

    runner(store.clone()).run_at(&units, now());
    let key = SummaryKey::new("alpha", ElevationLevel::Base);
    let first = store.get(&key).unwrap().unwrap();

    let report = runner(store.clone()).run_at(&units, now());
    for unit in &report.units {
        match &unit.outcome {
            UnitOutcome::Assessed { persisted, .. } => assert!(!persisted),
            other => panic!("expected assessment, got {:?}", other),
        }
    }
    assert_eq!(store.get(&key).unwrap().unwrap(), first);
}
