//! Job controller.
//!
//! Runs one job through its phases:
//!
//! 1. Validate configuration and job parameters
//! 2. Notify listeners that the job starts
//! 3. Delete stale outputs (optional)
//! 4. Plan one partition per matching input file
//! 5. Execute partitions on the worker pool
//! 6. Shut down the pool and the writer cache
//! 7. Notify listeners with the job report
//!
//! The pool and the writer cache live only for one run and are shut down on
//! every path out of the execute phase.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{PlanError, WriterError};
use crate::output::WriterCache;
use crate::partition::{PartitionPlanner, PartitionTask, StaleOutputMatcher};
use crate::scheduler::{JobReport, PoolError, WorkerPool};

use super::cancel::CancellationToken;
use super::config::{ConfigError, JobConfig};
use super::executor::PartitionedStepExecutor;
use super::processor::{NameProcessor, RecordProcessor};

/// Errors that abort a job as a whole.
#[derive(Debug, Error)]
pub enum JobError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Planning error, including invalid job parameters.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Worker pool error.
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// Writer shutdown error.
    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    /// Stale output cleanup failed.
    #[error("Cleanup failed: {0}")]
    Cleanup(String),
}

/// Receives job lifecycle notifications.
pub trait JobListener: Send + Sync {
    /// Called after validation, before any phase touches the filesystem.
    fn before_job(&self, _run_id: Uuid, _config: &JobConfig) {}

    /// Called once with the final report, whatever the outcome.
    fn after_job(&self, _report: &JobReport) {}
}

/// Logs job start and completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl JobListener for LoggingListener {
    fn before_job(&self, run_id: Uuid, config: &JobConfig) {
        info!(
            run_id = %run_id,
            input_dir = %config.input_dir.display(),
            output_dir = %config.output_dir.display(),
            pattern = %config.filename_pattern,
            workers = config.num_workers,
            routing = %config.routing,
            "Job started"
        );
    }

    fn after_job(&self, report: &JobReport) {
        for outcome in report.skipped_inputs() {
            warn!(
                task_id = %outcome.task_id,
                input = %outcome.input_path.display(),
                "Input skipped: header rejected"
            );
        }
        for outcome in report.failures() {
            warn!(
                task_id = %outcome.task_id,
                input = %outcome.input_path.display(),
                status = %outcome.status,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Partition did not complete"
            );
        }
        if let Some(fatal) = &report.fatal {
            error!(run_id = %report.run_id, error = %fatal, "Job aborted");
        }

        info!(
            run_id = %report.run_id,
            status = %report.status,
            partitions = report.outcomes.len(),
            records_written = report.total_written(),
            duration_ms = report.duration().num_milliseconds(),
            "Job finished"
        );
    }
}

/// Owns the lifecycle of one job run.
pub struct JobController {
    config: JobConfig,
    processor: Arc<dyn RecordProcessor>,
    listeners: Vec<Arc<dyn JobListener>>,
    cancel: CancellationToken,
}

impl JobController {
    /// Creates a controller with the default processor and a logging listener.
    pub fn new(config: JobConfig) -> Self {
        Self {
            config,
            processor: Arc::new(NameProcessor),
            listeners: vec![Arc::new(LoggingListener)],
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the record processor.
    pub fn with_processor(mut self, processor: Arc<dyn RecordProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Adds a lifecycle listener.
    pub fn with_listener(mut self, listener: Arc<dyn JobListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this controller's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Runs the job.
    ///
    /// Failures after validation do not return an error: they end up in the
    /// report, either as failed task outcomes or as the report's fatal error.
    ///
    /// # Errors
    ///
    /// Returns `JobError::Config` or `JobError::Plan` if the configuration or
    /// the job parameters are invalid. Listeners are not notified then.
    pub fn run(&self) -> Result<JobReport, JobError> {
        self.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        for listener in &self.listeners {
            listener.before_job(run_id, &self.config);
        }

        let report = match self.run_phases(run_id, started_at) {
            Ok(report) => report,
            Err(e) => JobReport::aborted(run_id, started_at, e.to_string()),
        };

        for listener in &self.listeners {
            listener.after_job(&report);
        }
        Ok(report)
    }

    /// Validates configuration and plans partitions without running them.
    ///
    /// # Errors
    ///
    /// Returns `JobError` if validation or planning fails.
    pub fn plan(&self) -> Result<Vec<PartitionTask>, JobError> {
        self.validate()?;
        Ok(self.planner().plan(&self.config.input_dir, &self.config.filename_pattern)?)
    }

    /// Deletes stale outputs from the output directory.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns `JobError` if the pattern is invalid or a file cannot be removed.
    pub fn cleanup(&self) -> Result<usize, JobError> {
        self.validate()?;
        let matcher = self.config.stale_output_matcher()?;
        cleanup_outputs(&self.config.output_dir, &matcher)
    }

    fn validate(&self) -> Result<(), JobError> {
        self.config.validate()?;
        self.config.validate_parameters()?;
        Ok(())
    }

    fn planner(&self) -> PartitionPlanner {
        PartitionPlanner::new()
            .with_marker(self.config.output_marker.as_str())
            .with_header_source(self.config.header_source())
    }

    fn run_phases(&self, run_id: Uuid, started_at: DateTime<Utc>) -> Result<JobReport, JobError> {
        if self.config.cleanup {
            let matcher = self.config.stale_output_matcher()?;
            cleanup_outputs(&self.config.output_dir, &matcher)?;
        }

        let tasks = self.planner().plan(&self.config.input_dir, &self.config.filename_pattern)?;
        if tasks.is_empty() {
            warn!(
                input_dir = %self.config.input_dir.display(),
                pattern = %self.config.filename_pattern,
                "No input files matched"
            );
        }

        let mut pool = WorkerPool::start(self.config.pool_config())?;
        let cache = Arc::new(WriterCache::new(&self.config.output_dir));

        let executor = PartitionedStepExecutor::from_config(
            &self.config,
            Arc::clone(&cache),
            Arc::clone(&self.processor),
            self.cancel.clone(),
        );
        let outcomes = executor.execute(&pool, tasks);

        let pool_result = pool.shutdown();
        let cache_result = cache.close_all();

        let mut report = JobReport::from_outcomes(run_id, started_at, outcomes);
        if let Err(e) = pool_result {
            report = report.with_fatal(JobError::from(e).to_string());
        }
        if let Err(e) = cache_result {
            report = report.with_fatal(JobError::from(e).to_string());
        }
        Ok(report)
    }
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Deletes files directly inside `output_dir` that `matcher` marks stale.
///
/// A missing output directory has nothing to clean.
///
/// # Errors
///
/// Returns `JobError::Cleanup` if the directory cannot be listed or a file
/// cannot be removed.
pub fn cleanup_outputs(output_dir: &Path, matcher: &StaleOutputMatcher) -> Result<usize, JobError> {
    if !output_dir.exists() {
        debug!(output_dir = %output_dir.display(), "Output directory missing, nothing to clean");
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(output_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| JobError::Cleanup(e.to_string()))?;
        if !entry.file_type().is_file() || !matcher.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }

        fs::remove_file(entry.path())
            .map_err(|e| JobError::Cleanup(format!("{}: {}", entry.path().display(), e)))?;
        debug!(path = %entry.path().display(), "Removed stale output");
        removed += 1;
    }

    info!(output_dir = %output_dir.display(), matcher = %matcher, removed, "Cleanup finished");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobStatus;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl JobListener for RecordingListener {
        fn before_job(&self, _run_id: Uuid, _config: &JobConfig) {
            self.events.lock().unwrap().push("before".to_string());
        }

        fn after_job(&self, report: &JobReport) {
            self.events.lock().unwrap().push(format!("after:{}", report.status));
        }
    }

    fn config(temp_dir: &TempDir) -> JobConfig {
        let input = temp_dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        JobConfig::new()
            .with_input_dir(input)
            .with_output_dir(temp_dir.path().join("out"))
            .with_filename_pattern("*.csv")
    }

    #[test]
    fn test_cleanup_outputs_removes_matching_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let out = temp_dir.path();
        fs::write(out.join("a-out.csv"), "x").unwrap();
        fs::write(out.join("b-out.csv"), "x").unwrap();
        fs::write(out.join("keep.csv"), "x").unwrap();
        fs::create_dir(out.join("dir-out.csv")).unwrap();

        let matcher = StaleOutputMatcher::derived("*.csv", "-out").unwrap();
        let removed = cleanup_outputs(out, &matcher).unwrap();

        assert_eq!(removed, 2);
        assert!(!out.join("a-out.csv").exists());
        assert!(out.join("keep.csv").exists());
        assert!(out.join("dir-out.csv").is_dir());
    }

    #[test]
    fn test_cleanup_outputs_with_match_all_input_pattern() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let out = temp_dir.path();
        fs::write(out.join("a-out.csv"), "x").unwrap();
        fs::write(out.join("notes-out"), "x").unwrap();
        fs::write(out.join("keep.csv"), "x").unwrap();

        let matcher = StaleOutputMatcher::derived("*", "-out").unwrap();
        assert_eq!(cleanup_outputs(out, &matcher).unwrap(), 2);
        assert!(!out.join("a-out.csv").exists());
        assert!(!out.join("notes-out").exists());
        assert!(out.join("keep.csv").exists());
    }

    #[test]
    fn test_cleanup_outputs_with_prefix_input_pattern() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let out = temp_dir.path();
        fs::write(out.join("data_1-out.csv"), "x").unwrap();
        fs::write(out.join("other-out.csv"), "x").unwrap();

        let matcher = StaleOutputMatcher::derived("data_*", "-out").unwrap();
        assert_eq!(cleanup_outputs(out, &matcher).unwrap(), 1);
        assert!(!out.join("data_1-out.csv").exists());
        assert!(out.join("other-out.csv").exists());
    }

    #[test]
    fn test_cleanup_outputs_missing_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let matcher = StaleOutputMatcher::derived("*.csv", "-out").unwrap();
        let removed = cleanup_outputs(&temp_dir.path().join("nope"), &matcher).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_cleanup_invalid_pattern() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let controller = JobController::new(config(&temp_dir).with_cleanup_pattern("[*.csv"));
        let err = controller.cleanup().unwrap_err();
        assert!(matches!(err, JobError::Plan(PlanError::ResourceResolution { .. })));
    }

    #[test]
    fn test_run_rejects_missing_parameters() {
        let listener = Arc::new(RecordingListener::default());
        let controller = JobController::new(JobConfig::new()).with_listener(listener.clone());

        let err = controller.run().unwrap_err();

        assert!(matches!(err, JobError::Plan(PlanError::InvalidParameter { .. })));
        assert!(listener.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_run_notifies_listeners() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&temp_dir);
        fs::write(config.input_dir.join("a.csv"), "first,last\nJo,Bloggs\n").unwrap();
        let listener = Arc::new(RecordingListener::default());

        let report = JobController::new(config)
            .with_listener(listener.clone())
            .run()
            .unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(*listener.events.lock().unwrap(), vec!["before", "after:completed"]);
    }

    #[test]
    fn test_run_plan_failure_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&temp_dir).with_input_dir(temp_dir.path().join("missing"));
        let listener = Arc::new(RecordingListener::default());

        let report = JobController::new(config)
            .with_listener(listener.clone())
            .run()
            .unwrap();

        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.outcomes.is_empty());
        assert!(report.fatal.as_deref().unwrap().contains("Planning error"));
        assert_eq!(*listener.events.lock().unwrap(), vec!["before", "after:failed"]);
    }

    #[test]
    fn test_run_cleans_stale_outputs() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&temp_dir);
        fs::write(config.input_dir.join("a.csv"), "first,last\nJo,Bloggs\n").unwrap();
        fs::create_dir_all(&config.output_dir).unwrap();
        fs::write(config.output_dir.join("old-out.csv"), "stale\n").unwrap();

        let report = JobController::new(config.clone()).run().unwrap();

        assert!(report.all_succeeded());
        assert!(!config.output_dir.join("old-out.csv").exists());
        assert!(config.output_dir.join("a-out.csv").exists());
    }

    #[test]
    fn test_plan_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&temp_dir);
        fs::write(config.input_dir.join("b.csv"), "first,last\n").unwrap();
        fs::write(config.input_dir.join("a.csv"), "first,last\n").unwrap();

        let tasks = JobController::new(config.clone()).plan().unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].output_filename, "a-out.csv");
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_cancelled_run_reports_cancelled() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&temp_dir);
        fs::write(config.input_dir.join("a.csv"), "first,last\nJo,Bloggs\n").unwrap();

        let controller = JobController::new(config);
        controller.cancellation_token().cancel();
        let report = controller.run().unwrap();

        assert_eq!(report.status, JobStatus::Cancelled);
        assert_eq!(report.total_written(), 0);
    }
}
