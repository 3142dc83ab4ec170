//! Task outcomes and job reports.
//!
//! This module defines the result types produced by a job run:
//!
//! - `TaskOutcome`: What happened to one partition task
//! - `TaskStatus`: Final status of one task
//! - `JobReport`: Aggregate of all task outcomes for one run
//! - `JobStatus`: Final status of the run

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

/// Final status of one partition task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Every record was read, transformed and written.
    Completed,
    /// The task aborted; see the outcome's error.
    Failed,
    /// Cancellation stopped the task before or between chunks.
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of running one partition task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// ID of the partition task.
    pub task_id: String,
    /// Input file the task read.
    pub input_path: PathBuf,
    /// Final status.
    pub status: TaskStatus,
    /// Records read from the input.
    pub records_read: usize,
    /// Records written to outputs (fully flushed chunks only).
    pub records_written: usize,
    /// False when the input's header was rejected and the file was skipped.
    pub header_valid: bool,
    /// Cause of failure or cancellation.
    pub error: Option<String>,
    /// Wall-clock duration of the task.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl TaskOutcome {
    /// Creates a completed outcome.
    pub fn completed(
        task_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        records_read: usize,
        records_written: usize,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            input_path: input_path.into(),
            status: TaskStatus::Completed,
            records_read,
            records_written,
            header_valid: true,
            error: None,
            duration,
        }
    }

    /// Creates a failed outcome.
    pub fn failed(
        task_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        error: &TaskError,
        duration: Duration,
    ) -> Self {
        let status = match error {
            TaskError::Cancelled { .. } => TaskStatus::Cancelled,
            _ => TaskStatus::Failed,
        };
        Self {
            task_id: task_id.into(),
            input_path: input_path.into(),
            status,
            records_read: 0,
            records_written: 0,
            header_valid: true,
            error: Some(error.to_string()),
            duration,
        }
    }

    /// Sets the record counters.
    pub fn with_counts(mut self, records_read: usize, records_written: usize) -> Self {
        self.records_read = records_read;
        self.records_written = records_written;
        self
    }

    /// Marks the input header as rejected.
    pub fn with_header_rejected(mut self) -> Self {
        self.header_valid = false;
        self
    }

    /// Returns whether the task completed.
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Final status of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every task completed.
    Completed,
    /// At least one task failed, or the job aborted before running tasks.
    Failed,
    /// Cancellation stopped at least one task and none failed.
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Aggregated result of one job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Unique identifier of the run.
    pub run_id: Uuid,
    /// Aggregate status.
    pub status: JobStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// One outcome per planned task, ordered by task id.
    pub outcomes: Vec<TaskOutcome>,
    /// Fatal error that aborted the run before or around task execution.
    #[serde(default)]
    pub fatal: Option<String>,
}

impl JobReport {
    /// Aggregates task outcomes into a report.
    pub fn from_outcomes(run_id: Uuid, started_at: DateTime<Utc>, mut outcomes: Vec<TaskOutcome>) -> Self {
        outcomes.sort_by(|a, b| natural_task_order(&a.task_id, &b.task_id));

        let status = if outcomes.iter().any(|o| o.status == TaskStatus::Failed) {
            JobStatus::Failed
        } else if outcomes.iter().any(|o| o.status == TaskStatus::Cancelled) {
            JobStatus::Cancelled
        } else {
            JobStatus::Completed
        };

        Self {
            run_id,
            status,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            fatal: None,
        }
    }

    /// A report for a run that aborted before producing task outcomes.
    pub fn aborted(run_id: Uuid, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            run_id,
            status: JobStatus::Failed,
            started_at,
            finished_at: Utc::now(),
            outcomes: Vec::new(),
            fatal: Some(error.into()),
        }
    }

    /// Marks the report failed because of an error after task execution.
    pub fn with_fatal(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.fatal = Some(error.into());
        self
    }

    /// Returns whether every task completed.
    pub fn all_succeeded(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Outcomes that did not complete.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Total records written across all tasks.
    pub fn total_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.records_written).sum()
    }

    /// Tasks whose input header was rejected.
    pub fn skipped_inputs(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.header_valid)
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Orders `partition2` before `partition10`.
fn natural_task_order(a: &str, b: &str) -> std::cmp::Ordering {
    fn split(id: &str) -> (&str, Option<u64>) {
        let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (prefix, number) = id.split_at(id.len() - digits);
        (prefix, number.parse().ok())
    }
    split(a).cmp(&split(b))
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
