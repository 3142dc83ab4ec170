//! Concurrent task execution on a fixed pool of worker threads.
//!
//! - **WorkerPool**: dedicated threads pulling tasks from a bounded queue
//! - **TaskOutcome / JobReport**: per-partition results and the job summary
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │   Executor   │
//!                      │   (submit)   │
//!                      └──────┬───────┘
//!                             │
//!                      ┌──────▼───────┐
//!                      │   Bounded    │
//!                      │    Queue     │
//!                      └──────┬───────┘
//!                             │
//!         ┌───────────────────┼───────────────────┐
//!         │                   │                   │
//!         ▼                   ▼                   ▼
//!    ┌─────────┐         ┌─────────┐         ┌─────────┐
//!    │ Worker 1│         │ Worker 2│         │ Worker N│
//!    └─────────┘         └─────────┘         └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use partbatch::scheduler::{SubmitPolicy, WorkerPool, WorkerPoolConfig};
//!
//! let config = WorkerPoolConfig::new(4)
//!     .with_queue_capacity(8)
//!     .with_submit_policy(SubmitPolicy::Block);
//!
//! let mut pool = WorkerPool::start(config)?;
//! pool.submit(|| println!("running on a worker"))?;
//!
//! // Queued tasks drain before the workers exit.
//! pool.shutdown()?;
//! ```

pub mod job;
pub mod worker_pool;

pub use job::{JobReport, JobStatus, TaskOutcome, TaskStatus};
pub use worker_pool::{PoolError, PoolStats, PoolTask, SubmitPolicy, WorkerPool, WorkerPoolConfig};
