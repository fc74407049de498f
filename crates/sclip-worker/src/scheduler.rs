//! Run loop.
//!
//! A run happens immediately at startup and then once per interval. A run
//! that outlasts the interval delays the next tick instead of dropping it.
//! Shutdown is only observed between runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use sclip_models::ClaimFilter;

use crate::config::{RunMode, WorkerConfig};
use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::{RecordOutcome, RecordPipeline};
use crate::retry::FailureTracker;

/// Consecutive failed runs logged in full before suppression.
const MAX_LOGGED_CYCLE_FAILURES: u32 = 3;

/// Schedule knobs.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub mode: RunMode,
    pub interval: Duration,
    pub drain_retry_delay: Duration,
    pub drain_max_restarts: u32,
    pub max_record_failures: Option<u32>,
}

impl SchedulerSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            mode: config.run_mode,
            interval: config.run_interval,
            drain_retry_delay: config.drain_retry_delay,
            drain_max_restarts: config.drain_max_restarts,
            max_record_failures: config.max_record_failures,
        }
    }
}

/// Tally of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub committed: usize,
    pub aborted: usize,
    pub skipped: usize,
    /// Drain restarts after store errors
    pub restarts: u32,
}

impl CycleReport {
    fn tally(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Committed(_) => self.committed += 1,
            RecordOutcome::Aborted { .. } => self.aborted += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Whether no record was claimed at all.
    pub fn is_idle(&self) -> bool {
        self.committed + self.aborted + self.skipped == 0
    }
}

/// Drives the pipeline on a timer.
pub struct Scheduler {
    pipeline: Arc<RecordPipeline>,
    settings: SchedulerSettings,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<RecordPipeline>, settings: SchedulerSettings) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            pipeline,
            settings,
            shutdown,
        }
    }

    /// Tick until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            mode = %self.settings.mode,
            interval_secs = self.settings.interval.as_secs(),
            "Starting scheduler"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        if *shutdown_rx.borrow_and_update() {
            return Ok(());
        }

        let mut interval = tokio::time::interval(self.settings.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = FailureTracker::new(MAX_LOGGED_CYCLE_FAILURES);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Scheduler shutting down");
                        break;
                    }
                }
                _ = interval.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => {
                            failures.record_success();
                            if !report.is_idle() {
                                info!(
                                    committed = report.committed,
                                    aborted = report.aborted,
                                    skipped = report.skipped,
                                    "Run finished"
                                );
                            }
                        }
                        Err(e) => {
                            if failures.record_failure() {
                                error!(stage = %e.stage(), "Run failed, retrying next tick: {}", e);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// One scheduled run in the configured mode.
    pub async fn run_cycle(&self) -> WorkerResult<CycleReport> {
        let started = Instant::now();
        let result = match self.settings.mode {
            RunMode::Single => self.run_single().await,
            RunMode::Drain => self.run_drain().await,
        };
        metrics::record_cycle(started.elapsed());
        result
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn claim_filter(&self) -> ClaimFilter {
        ClaimFilter::new().with_max_failures(self.settings.max_record_failures)
    }

    async fn run_single(&self) -> WorkerResult<CycleReport> {
        let mut report = CycleReport::default();

        match self.pipeline.claim_next(&self.claim_filter()).await? {
            Some(record) => {
                let outcome = self.pipeline.process(&record).await;
                report.tally(&outcome);
            }
            None => info!("No unprocessed records"),
        }

        Ok(report)
    }

    /// Process records until none are left.
    ///
    /// Every record claimed during the run is excluded from later claims in
    /// the same run, so an aborted record is not retried until the next tick.
    async fn run_drain(&self) -> WorkerResult<CycleReport> {
        let mut filter = self.claim_filter();
        let mut report = CycleReport::default();

        loop {
            match self.pipeline.claim_next(&filter).await {
                Ok(Some(record)) => {
                    filter.exclude(record.id.clone());
                    let outcome = self.pipeline.process(&record).await;
                    report.tally(&outcome);
                }
                Ok(None) => {
                    info!(
                        committed = report.committed,
                        aborted = report.aborted,
                        "Drain complete"
                    );
                    return Ok(report);
                }
                Err(e) if e.is_cycle_fatal() && report.restarts < self.settings.drain_max_restarts => {
                    report.restarts += 1;
                    warn!(
                        restart = report.restarts,
                        delay_secs = self.settings.drain_retry_delay.as_secs(),
                        "Store error during drain, restarting: {}",
                        e
                    );
                    tokio::time::sleep(self.settings.drain_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
