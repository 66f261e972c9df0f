use super::record::JobRecord;
use super::store::JobStore;
use crate::config::AppConfig;
use crate::data::{LabelStore, MarketDataSource};
use crate::error::{Result, TradepulseError};
use crate::labeling::{GenerationObserver, LabelGenerator, LabelStats};
use crate::training::{ModelMetadata, ModelTrainer, TrainingObserver, TrainingReport};
use log::{error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleep increment; shutdown is honored at this granularity instead of only
/// between full polls
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Share of a job's progress attributed to labeling; training owns the rest
const LABELING_SHARE: f64 = 50.0;

/// Cooperative stop signal shared with the host process
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polls the queue and runs at most one training job at a time: label
/// generation, then the training collaborator, with progress written back to
/// the job record and `cancel_requested` observed at every symbol boundary
/// and trial boundary. A job failure never takes the daemon down; shutdown
/// drains the in-flight job before the loop exits.
pub struct JobDaemon {
    store: Arc<dyn JobStore>,
    source: Arc<dyn MarketDataSource>,
    labels: Arc<dyn LabelStore>,
    trainer: Arc<dyn ModelTrainer>,
    symbols: Vec<String>,
    config: AppConfig,
}

impl JobDaemon {
    pub fn new(
        store: Arc<dyn JobStore>,
        source: Arc<dyn MarketDataSource>,
        labels: Arc<dyn LabelStore>,
        trainer: Arc<dyn ModelTrainer>,
        symbols: Vec<String>,
        config: AppConfig,
    ) -> Result<Self> {
        config.validate()?;
        if symbols.is_empty() {
            return Err(TradepulseError::Configuration(
                "daemon needs at least one symbol to label".to_string(),
            ));
        }
        Ok(Self {
            store,
            source,
            labels,
            trainer,
            symbols,
            config,
        })
    }

    /// Blocks until `shutdown` is triggered. Jobs left RUNNING by a previous
    /// process are failed as orphaned before polling starts.
    pub fn run(&self, shutdown: &ShutdownFlag) -> Result<()> {
        self.store.fail_orphaned()?;
        info!(
            "daemon polling every {}s over {} symbols",
            self.config.daemon.poll_interval_secs,
            self.symbols.len()
        );

        while !shutdown.is_triggered() {
            match self.store.claim_next() {
                Ok(Some(job)) => self.run_job(job),
                Ok(None) => self.idle_sleep(shutdown),
                Err(e) => {
                    error!("queue poll failed: {}", e);
                    self.idle_sleep(shutdown);
                }
            }
        }

        info!("daemon stopped");
        Ok(())
    }

    /// Runs one claimed job to a terminal state. Errors and panics are
    /// absorbed into the job record.
    fn run_job(&self, job: JobRecord) {
        info!("job {} starting on {}", job.id, job.timeframe);

        let outcome = catch_unwind(AssertUnwindSafe(|| self.execute(&job)))
            .unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(TradepulseError::JobExecution(format!(
                    "panicked: {}",
                    message
                )))
            });

        let transition = match outcome {
            Ok(report) => {
                info!("job {} completed", job.id);
                self.store.complete(job.id, &report.metrics_json())
            }
            Err(TradepulseError::Cancelled) => {
                info!("job {} cancelled; partial output discarded", job.id);
                self.store.cancel(job.id)
            }
            Err(e) => {
                warn!("job {} failed: {}", job.id, e);
                self.store.fail(job.id, &e.to_string())
            }
        };

        if let Err(e) = transition {
            error!("terminal transition for job {} failed: {}", job.id, e);
        }
    }

    /// Labeling then training. Nothing is persisted until both succeed, so a
    /// cancellation or failure anywhere leaves no partial output behind.
    fn execute(&self, job: &JobRecord) -> Result<TrainingReport> {
        let generator =
            LabelGenerator::new(self.config.exit_policy.clone(), &self.config.labeling)?;

        let labeling_progress = JobProgress {
            store: self.store.as_ref(),
            job_id: job.id,
            base: 0.0,
            span: LABELING_SHARE,
        };
        let output = generator.generate(
            self.source.as_ref(),
            &self.symbols,
            job.timeframe,
            &labeling_progress,
        )?;

        if output.records.is_empty() {
            return Err(TradepulseError::JobExecution(format!(
                "no labels generated for {} ({} symbols skipped)",
                job.timeframe,
                output.skipped.len()
            )));
        }
        info!(
            "job {}: {}",
            job.id,
            LabelStats::analyze(&output.records).summary()
        );

        let training_progress = JobProgress {
            store: self.store.as_ref(),
            job_id: job.id,
            base: LABELING_SHARE,
            span: 100.0 - LABELING_SHARE,
        };
        let report = self.trainer.train(
            &output.records,
            job.timeframe,
            &job.params,
            &training_progress,
        )?;

        self.labels.replace_labels(job.timeframe, &output.records)?;
        let metadata_path =
            ModelMetadata::from_report(job.timeframe, &report).write_to(&self.artifact_dir())?;
        info!("job {}: metadata written to {}", job.id, metadata_path.display());

        if let Err(e) = self.store.report_progress(job.id, 100.0) {
            warn!("final progress update for job {} rejected: {}", job.id, e);
        }
        Ok(report)
    }

    fn artifact_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.daemon.artifact_dir)
    }

    fn idle_sleep(&self, shutdown: &ShutdownFlag) {
        let deadline = std::time::Instant::now() + self.config.daemon.poll_interval();
        while std::time::Instant::now() < deadline && !shutdown.is_triggered() {
            std::thread::sleep(SLEEP_SLICE);
        }
    }
}

/// Maps per-symbol and per-trial completion onto the job's progress range and
/// relays the persisted cancel flag to the workers
struct JobProgress<'a> {
    store: &'a dyn JobStore,
    job_id: i64,
    base: f64,
    span: f64,
}

impl JobProgress<'_> {
    fn report(&self, completed: usize, total: usize) {
        let pct = self.base + self.span * completed as f64 / total.max(1) as f64;
        if let Err(e) = self.store.report_progress(self.job_id, pct) {
            warn!("progress update for job {} rejected: {}", self.job_id, e);
        }
    }

    fn cancel_flag(&self) -> bool {
        match self.store.is_cancel_requested(self.job_id) {
            Ok(flag) => flag,
            Err(e) => {
                warn!("cancel check for job {} failed: {}", self.job_id, e);
                false
            }
        }
    }
}

impl GenerationObserver for JobProgress<'_> {
    fn on_symbol_complete(&self, completed: usize, total: usize) {
        self.report(completed, total);
    }

    fn should_cancel(&self) -> bool {
        self.cancel_flag()
    }
}

impl TrainingObserver for JobProgress<'_> {
    fn on_trial_complete(&self, completed: usize, total: usize) {
        self.report(completed, total);
    }

    fn should_cancel(&self) -> bool {
        self.cancel_flag()
    }
}
