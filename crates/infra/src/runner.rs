//! Scheduled daily analysis.
//!
//! A background thread owns the calendar: the whole-catalog analysis runs
//! once for each day the clock reaches, again whenever someone asks for a
//! rerun (e.g. after a bulk sales import), and expired cache entries are
//! swept on their own cadence in between. Failures are logged and retried
//! with bounded exponential backoff; they never escape the thread.

use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use bookwise_catalog::DataAccessor;
use bookwise_core::AnalyticsResult;

use crate::clock::Clock;
use crate::config::RunnerConfig;
use crate::service::{DailyAnalysisReport, InventoryIntelligence, PurgeReport};

/// What the runner drives.
pub trait ScheduledAnalysis: Send + Sync + 'static {
    /// Idempotent whole-catalog analysis for `as_of`.
    fn run_for(&self, as_of: NaiveDate) -> AnalyticsResult<DailyAnalysisReport>;

    /// Drop analysis history dated before `cutoff`.
    fn purge_before(&self, cutoff: NaiveDate) -> AnalyticsResult<PurgeReport>;

    /// Remove expired cache entries; returns how many went.
    fn sweep_expired_aggregates(&self) -> usize {
        0
    }
}

impl<A> ScheduledAnalysis for InventoryIntelligence<A>
where
    A: DataAccessor + 'static,
{
    fn run_for(&self, as_of: NaiveDate) -> AnalyticsResult<DailyAnalysisReport> {
        self.run_daily_analysis(as_of)
    }

    fn purge_before(&self, cutoff: NaiveDate) -> AnalyticsResult<PurgeReport> {
        self.purge_older_than(cutoff)
    }

    fn sweep_expired_aggregates(&self) -> usize {
        self.sweep_cache()
    }
}

/// Receives each finished daily report.
pub trait AnalysisReportSink: Send + Sync + 'static {
    fn emit(&self, report: DailyAnalysisReport);
}

/// Keeps every report in memory (tests, the batch tool).
#[derive(Debug, Default)]
pub struct InMemoryReportSink {
    reports: Mutex<Vec<DailyAnalysisReport>>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<DailyAnalysisReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AnalysisReportSink for InMemoryReportSink {
    fn emit(&self, report: DailyAnalysisReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    /// Rerun today's analysis even if it already completed.
    Rerun,
    Stop,
}

/// Control handle of a spawned runner.
///
/// Dropping the handle without calling [`stop`](Self::stop) also ends the
/// thread once it next wakes up.
#[derive(Debug)]
pub struct AnalysisRunnerHandle {
    control: mpsc::Sender<Control>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AnalysisRunnerHandle {
    /// Ask for today's analysis to be recomputed.
    ///
    /// Requests that arrive before the rerun starts collapse into one.
    pub fn request_rerun(&self) {
        let _ = self.control.send(Control::Rerun);
    }

    /// Stop the runner and wait for an in-flight run to finish.
    pub fn stop(mut self) {
        let _ = self.control.send(Control::Stop);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisRunner {
    config: RunnerConfig,
}

impl AnalysisRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Start the runner thread. Today's analysis runs immediately, then once
    /// per new calendar day of `clock`.
    pub fn spawn<S, K>(
        &self,
        name: &str,
        analysis: Arc<S>,
        sink: Arc<K>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<AnalysisRunnerHandle>
    where
        S: ScheduledAnalysis,
        K: AnalysisReportSink,
    {
        let (control_tx, control_rx) = mpsc::channel();
        let worker = Worker {
            name: name.to_string(),
            calendar: Calendar::new(self.config.clone(), Instant::now()),
            analysis,
            sink,
            clock,
        };
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker.run(control_rx))?;

        Ok(AnalysisRunnerHandle {
            control: control_tx,
            thread: Some(thread),
        })
    }
}

/// When the next daily run and the next sweep are due.
#[derive(Debug)]
struct Calendar {
    config: RunnerConfig,
    /// Last day whose analysis succeeded or exhausted its retries.
    settled: Option<NaiveDate>,
    rerun_requested: bool,
    failed_attempts: u32,
    retry_at: Option<Instant>,
    next_sweep: Instant,
}

impl Calendar {
    fn new(config: RunnerConfig, now: Instant) -> Self {
        Self {
            next_sweep: now + config.sweep_interval,
            config,
            settled: None,
            rerun_requested: false,
            failed_attempts: 0,
            retry_at: None,
        }
    }

    fn analysis_due(&self, today: NaiveDate, now: Instant) -> bool {
        if self.retry_at.is_some_and(|at| now < at) {
            return false;
        }
        self.rerun_requested || self.failed_attempts > 0 || self.settled != Some(today)
    }

    fn sweep_due(&self, now: Instant) -> bool {
        now >= self.next_sweep
    }

    fn swept(&mut self, now: Instant) {
        self.next_sweep = now + self.config.sweep_interval;
    }

    fn succeeded(&mut self, today: NaiveDate) {
        self.settled = Some(today);
        self.failed_attempts = 0;
        self.retry_at = None;
    }

    /// Returns whether another attempt is scheduled.
    fn failed(&mut self, today: NaiveDate, now: Instant) -> bool {
        self.failed_attempts += 1;
        if self.failed_attempts <= self.config.max_retries {
            self.retry_at = Some(now + self.config.retry_delay(self.failed_attempts));
            return true;
        }
        // Out of retries: leave the day alone until tomorrow or a rerun request.
        self.succeeded(today);
        false
    }

    /// How long the thread may block before something could be due.
    fn idle_for(&self, now: Instant) -> Duration {
        let mut wait = self
            .config
            .check_interval
            .min(self.next_sweep.saturating_duration_since(now));
        if let Some(at) = self.retry_at {
            wait = wait.min(at.saturating_duration_since(now));
        }
        wait.max(Duration::from_millis(1))
    }
}

struct Worker<S, K> {
    name: String,
    calendar: Calendar,
    analysis: Arc<S>,
    sink: Arc<K>,
    clock: Arc<dyn Clock>,
}

impl<S, K> Worker<S, K>
where
    S: ScheduledAnalysis,
    K: AnalysisReportSink,
{
    fn run(mut self, control: mpsc::Receiver<Control>) {
        info!(
            runner = %self.name,
            check_secs = self.calendar.config.check_interval.as_secs(),
            sweep_secs = self.calendar.config.sweep_interval.as_secs(),
            "analysis runner started"
        );

        // The first pass never blocks, so today's run starts right away.
        let mut wait = Duration::ZERO;
        loop {
            // Block until the next deadline or a control message.
            match control.recv_timeout(wait) {
                Ok(Control::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Ok(Control::Rerun) => self.calendar.rerun_requested = true,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
            // Collapse a burst of requests; a stop among them still wins.
            let mut stop = false;
            for msg in control.try_iter() {
                match msg {
                    Control::Stop => stop = true,
                    Control::Rerun => self.calendar.rerun_requested = true,
                }
            }
            if stop {
                break;
            }

            let now = Instant::now();
            if self.calendar.sweep_due(now) {
                let removed = self.analysis.sweep_expired_aggregates();
                debug!(runner = %self.name, removed, "expired aggregates swept");
                self.calendar.swept(now);
            }

            let today = self.clock.today();
            if self.calendar.analysis_due(today, now) {
                self.calendar.rerun_requested = false;
                self.run_day(today);
            }

            wait = self.calendar.idle_for(Instant::now());
        }

        info!(runner = %self.name, "analysis runner stopped");
    }

    fn run_day(&mut self, today: NaiveDate) {
        match self.analysis.run_for(today) {
            Ok(report) => {
                self.calendar.succeeded(today);
                self.sink.emit(report);
                self.housekeeping(today);
            }
            Err(e) => {
                let attempt = self.calendar.failed_attempts + 1;
                let retrying = self.calendar.failed(today, Instant::now());
                warn!(
                    runner = %self.name,
                    as_of = %today,
                    attempt,
                    retrying,
                    error = %e,
                    "daily analysis failed"
                );
            }
        }
    }

    /// Retention purge. Failures here never fail the day.
    fn housekeeping(&self, today: NaiveDate) {
        let days = Days::new(u64::from(self.calendar.config.retention_days));
        let Some(cutoff) = today.checked_sub_days(days) else {
            return;
        };
        if let Err(e) = self.analysis.purge_before(cutoff) {
            warn!(runner = %self.name, cutoff = %cutoff, error = %e, "retention purge failed");
        }
    }
}
