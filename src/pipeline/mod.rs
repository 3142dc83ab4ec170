//! Job pipeline: configuration, record processing, partitioned execution
//! and job control.
//!
//! # Architecture
//!
//! - **Controller**: runs the job phases and owns the pool and writer cache
//! - **Executor**: runs each partition on the pool, chunk by chunk
//! - **Processor**: transforms one record
//! - **Config**: settings for one job run
//!
//! # Pipeline Flow
//!
//! 1. **Validation**: configuration and job parameters are checked
//! 2. **Cleanup**: stale outputs from a previous run are deleted
//! 3. **Planning**: one partition per matching input file
//! 4. **Execution**: partitions run concurrently, each one sequentially
//!    reading, transforming and writing chunks of records
//! 5. **Shutdown**: the worker pool drains and every writer is closed once
//!
//! # Example
//!
//! ```rust,ignore
//! use partbatch::pipeline::{JobConfig, JobController};
//!
//! let config = JobConfig::new()
//!     .with_input_dir("data/in")
//!     .with_output_dir("data/out")
//!     .with_filename_pattern("*.csv")
//!     .with_workers(4);
//!
//! let report = JobController::new(config).run()?;
//! println!("{} record(s) written, status {}", report.total_written(), report.status);
//! ```

pub mod cancel;
pub mod config;
pub mod controller;
pub mod executor;
pub mod processor;

pub use cancel::CancellationToken;
pub use config::{ConfigError, JobConfig, RoutingMode};
pub use controller::{cleanup_outputs, JobController, JobError, JobListener, LoggingListener};
pub use executor::{PartitionedStepExecutor, DEFAULT_CHUNK_SIZE};
pub use processor::{NameProcessor, RecordProcessor};
