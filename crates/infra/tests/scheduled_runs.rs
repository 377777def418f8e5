//! Background runner: startup run, day rollover, reruns, retries, cache sweeps, stop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, TimeZone, Utc};

use bookwise_catalog::{Book, Category, InMemoryDataAccessor, InventorySnapshot, SalesObservation, TechnologyLevel};
use bookwise_core::{AnalysisRunId, AnalyticsError, AnalyticsResult, BookId};
use bookwise_infra::{
    AnalysisRunner, DailyAnalysisReport, InMemoryReportSink, IntelligenceConfig, InventoryIntelligence, ManualClock,
    PurgeReport, RunnerConfig, ScheduledAnalysis,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 2, 0, 0).unwrap()))
}

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}

fn fast_checks() -> RunnerConfig {
    RunnerConfig::default()
        .with_check_interval(Duration::from_millis(20))
        .with_base_backoff(Duration::from_millis(10))
}

/// Fails the first `failures` runs, then succeeds.
struct Flaky {
    failures: u32,
    attempts: AtomicU32,
}

impl ScheduledAnalysis for Flaky {
    fn run_for(&self, as_of: NaiveDate) -> AnalyticsResult<DailyAnalysisReport> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(AnalyticsError::unavailable("sales database offline"));
        }
        Ok(DailyAnalysisReport {
            run_id: AnalysisRunId::new(),
            as_of,
            forecasts: Default::default(),
            classification: Default::default(),
            risk_levels: Default::default(),
            recommendations: 0,
            stock_status: Default::default(),
            stock: Default::default(),
        })
    }

    fn purge_before(&self, _cutoff: NaiveDate) -> AnalyticsResult<PurgeReport> {
        Ok(PurgeReport::default())
    }
}

/// Counts cache sweeps; the analysis itself always succeeds.
#[derive(Default)]
struct Sweeps {
    sweeps: AtomicU32,
}

impl ScheduledAnalysis for Sweeps {
    fn run_for(&self, as_of: NaiveDate) -> AnalyticsResult<DailyAnalysisReport> {
        Flaky {
            failures: 0,
            attempts: AtomicU32::new(0),
        }
        .run_for(as_of)
    }

    fn purge_before(&self, _cutoff: NaiveDate) -> AnalyticsResult<PurgeReport> {
        Ok(PurgeReport::default())
    }

    fn sweep_expired_aggregates(&self) -> usize {
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        0
    }
}

#[test]
fn runs_on_startup_and_on_rerun_request() {
    let accessor = InMemoryDataAccessor::new();
    accessor.upsert_book(Book {
        id: BookId::from_u128(7),
        title: "Query Planning".to_string(),
        publisher: "Acme Press".to_string(),
        category: Category::Databases,
        technology_level: TechnologyLevel::Established,
        price: 45.0,
        publication_date: d(2022, 6, 1),
    });
    for month in 1..=12 {
        accessor.record_sale(SalesObservation::new(BookId::from_u128(7), d(2025, month, 3), 12));
    }
    accessor.set_inventory(InventorySnapshot::new(BookId::from_u128(7), 5, 5));

    let svc = Arc::new(InventoryIntelligence::new(accessor, IntelligenceConfig::default()).unwrap());
    let sink = Arc::new(InMemoryReportSink::new());
    let handle = AnalysisRunner::new(fast_checks())
        .spawn("analysis-runner-test", svc.clone(), sink.clone(), clock())
        .unwrap();

    assert!(wait_for(Duration::from_secs(10), || sink.all().len() == 1));
    assert_eq!(sink.all()[0].as_of, d(2026, 1, 15));

    // Same day: frequent checks must not repeat the run.
    thread::sleep(Duration::from_millis(200));
    assert_eq!(sink.all().len(), 1);

    handle.request_rerun();
    assert!(wait_for(Duration::from_secs(10), || sink.all().len() == 2));
    handle.stop();

    assert_eq!(svc.latest_forecasts(BookId::from_u128(7)).unwrap().len(), 5);
}

#[test]
fn failed_runs_are_retried_with_backoff() {
    let flaky = Arc::new(Flaky {
        failures: 2,
        attempts: AtomicU32::new(0),
    });
    let sink = Arc::new(InMemoryReportSink::new());
    let handle = AnalysisRunner::new(fast_checks().with_max_retries(5))
        .spawn("flaky-runner-test", flaky.clone(), sink.clone(), clock())
        .unwrap();

    assert!(wait_for(Duration::from_secs(10), || sink.all().len() == 1));
    handle.stop();

    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn gives_up_after_max_retries() {
    let flaky = Arc::new(Flaky {
        failures: u32::MAX,
        attempts: AtomicU32::new(0),
    });
    let sink = Arc::new(InMemoryReportSink::new());
    let handle = AnalysisRunner::new(fast_checks().with_max_retries(2))
        .spawn("hopeless-runner-test", flaky.clone(), sink.clone(), clock())
        .unwrap();

    assert!(wait_for(Duration::from_secs(10), || flaky.attempts.load(Ordering::SeqCst) >= 3));
    thread::sleep(Duration::from_millis(300));
    handle.stop();

    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 3);
    assert!(sink.all().is_empty());
}

#[test]
fn next_calendar_day_gets_its_own_run() {
    let flaky = Arc::new(Flaky {
        failures: 0,
        attempts: AtomicU32::new(0),
    });
    let clock = clock();
    let sink = Arc::new(InMemoryReportSink::new());
    let handle = AnalysisRunner::new(fast_checks())
        .spawn("daily-runner-test", flaky.clone(), sink.clone(), clock.clone())
        .unwrap();

    assert!(wait_for(Duration::from_secs(10), || sink.all().len() == 1));
    clock.advance(chrono::Duration::days(1));
    assert!(wait_for(Duration::from_secs(10), || sink.all().len() == 2));
    handle.stop();

    let days: Vec<NaiveDate> = sink.all().iter().map(|r| r.as_of).collect();
    assert_eq!(days, vec![d(2026, 1, 15), d(2026, 1, 16)]);
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn expired_aggregates_are_swept_on_their_own_cadence() {
    let analysis = Arc::new(Sweeps::default());
    let sink = Arc::new(InMemoryReportSink::new());
    let handle = AnalysisRunner::new(fast_checks().with_sweep_interval(Duration::from_millis(20)))
        .spawn("sweeping-runner-test", analysis.clone(), sink.clone(), clock())
        .unwrap();

    assert!(wait_for(Duration::from_secs(10), || analysis.sweeps.load(Ordering::SeqCst) >= 3));
    handle.stop();

    // Sweeps never trigger extra analysis runs.
    assert_eq!(sink.all().len(), 1);
}
