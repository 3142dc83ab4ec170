//! Error types for partbatch operations.
//!
//! Defines error types for the subsystems shared across modules:
//! - Partition planning (fatal to the whole job)
//! - Input reading and record decoding
//! - Output writer lifecycle
//! - Per-task execution failures

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while planning partitions.
///
/// Every variant is fatal: planning aborts before any task runs.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to resolve input pattern '{pattern}' in {dir}: {reason}")]
    ResourceResolution {
        dir: PathBuf,
        pattern: String,
        reason: String,
    },

    #[error("Resource does not exist: {0}")]
    MissingResource(PathBuf),

    #[error("Invalid job parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the header-validating reader.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Reader for {0} was read before being opened")]
    NotOpen(PathBuf),

    #[error("Failed to decode line {line}: {reason}")]
    Decode { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the writer cache and its handles.
#[derive(Debug, Error)]
pub enum WriterError {
    /// A second open of an already cached path. Indicates a broken cache
    /// invariant and must never be observed.
    #[error("Writer for {0} was opened more than once")]
    DuplicateOpen(PathBuf),

    #[error("Writer for {path} is still referenced by {holders} holder(s) at shutdown")]
    StillInUse { path: PathBuf, holders: usize },

    #[error("Writer for {0} is already closed")]
    Closed(PathBuf),

    #[error("Record has no output key: {0}")]
    MissingKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-record transform failure reported by a record processor.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors that fail a single partition task.
///
/// These are captured in the task's outcome; they never abort sibling tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Transform failed at record {index}: {source}")]
    Transform {
        index: usize,
        #[source]
        source: TransformError,
    },

    #[error("Decode failed at record {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: ReadError,
    },

    #[error("Routing failed at record {index}: {source}")]
    Routing {
        index: usize,
        #[source]
        source: WriterError,
    },

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Task submission rejected: {0}")]
    Pool(String),

    #[error("Task cancelled after {records_written} record(s)")]
    Cancelled { records_written: usize },
}
