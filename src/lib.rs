//! partbatch: partitioned, concurrent processing of delimited files.
//!
//! A job discovers input files matching a pattern, plans one partition per
//! file, and runs the partitions on a bounded pool of worker threads. Each
//! partition reads its file in chunks, transforms every record and appends
//! the results to an output chosen per partition or per record.

pub mod cli;
pub mod codec;
pub mod error;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod reader;
pub mod scheduler;

// Re-export commonly used types
pub use codec::{DelimitedCodec, Record, RecordCodec};
pub use error::{PlanError, ReadError, TaskError, TransformError, WriterError};
pub use pipeline::{CancellationToken, JobConfig, JobController, JobError};
pub use scheduler::{JobReport, JobStatus, TaskOutcome, TaskStatus};
