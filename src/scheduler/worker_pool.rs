//! Fixed-size worker pool with a bounded submission queue.
//!
//! Each worker is a dedicated OS thread pulling tasks from a shared bounded
//! channel. Tasks run blocking I/O to completion; there is no async
//! suspension inside the pool.
//!
//! # Features
//!
//! - Configurable number of workers and queue depth
//! - Blocking or rejecting submission when the queue is full
//! - Graceful shutdown: queued tasks drain, then workers exit
//! - A panicking task does not take its worker down
//! - Pool statistics tracking

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// A unit of work executed by a worker thread.
pub type PoolTask = Box<dyn FnOnce() + Send + 'static>;

/// Errors that can occur in the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The bounded queue is full and the pool rejects instead of blocking.
    #[error("Worker pool saturated: queue of {capacity} task(s) is full")]
    Saturated { capacity: usize },

    /// The pool no longer accepts tasks.
    #[error("Worker pool is shut down")]
    ShutDown,

    /// A worker thread could not be spawned.
    #[error("Worker initialization failed: {0}")]
    WorkerInitFailed(String),

    /// Worker threads died during shutdown.
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

/// What `submit` does when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Wait until a slot frees up.
    #[default]
    Block,
    /// Fail with `PoolError::Saturated`.
    Reject,
}

impl std::str::FromStr for SubmitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(SubmitPolicy::Block),
            "reject" => Ok(SubmitPolicy::Reject),
            other => Err(format!("unknown submit policy '{other}' (expected block or reject)")),
        }
    }
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    pub num_workers: usize,
    /// Tasks that may wait for a free worker.
    pub queue_capacity: usize,
    /// Behaviour when the queue is full.
    pub submit_policy: SubmitPolicy,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 10,
            queue_capacity: 10,
            submit_policy: SubmitPolicy::Block,
        }
    }
}

impl WorkerPoolConfig {
    /// Creates a new configuration with the specified number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the submit policy.
    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.submit_policy = policy;
        self
    }
}

/// Statistics about the worker pool.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total number of workers in the pool.
    pub num_workers: usize,
    /// Number of workers currently running a task.
    pub active_workers: usize,
    /// Tasks that ran to completion.
    pub tasks_completed: u64,
    /// Tasks that panicked.
    pub tasks_panicked: u64,
    /// Average task duration.
    pub average_task_duration: Duration,
}

impl PoolStats {
    /// Returns the total number of tasks run.
    pub fn total_processed(&self) -> u64 {
        self.tasks_completed + self.tasks_panicked
    }
}

/// Shared state for tracking pool statistics.
struct SharedPoolStats {
    tasks_completed: AtomicU64,
    tasks_panicked: AtomicU64,
    total_duration_ms: AtomicU64,
    active_workers: AtomicU64,
}

impl SharedPoolStats {
    fn new() -> Self {
        Self {
            tasks_completed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            active_workers: AtomicU64::new(0),
        }
    }

    fn record_completion(&self, duration: Duration) {
        self.tasks_completed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn record_panic(&self, duration: Duration) {
        self.tasks_panicked.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn increment_active(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement_active(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    fn to_pool_stats(&self, num_workers: usize) -> PoolStats {
        let completed = self.tasks_completed.load(Ordering::SeqCst);
        let panicked = self.tasks_panicked.load(Ordering::SeqCst);
        let total_duration_ms = self.total_duration_ms.load(Ordering::SeqCst);
        let active = self.active_workers.load(Ordering::SeqCst);

        let total = completed + panicked;
        let average_duration = if total > 0 {
            Duration::from_millis(total_duration_ms / total)
        } else {
            Duration::ZERO
        };

        PoolStats {
            num_workers,
            active_workers: active as usize,
            tasks_completed: completed,
            tasks_panicked: panicked,
            average_task_duration: average_duration,
        }
    }
}

/// Pool of worker threads fed by a bounded queue.
///
/// Dropping the pool shuts it down and joins every worker.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: Option<Sender<PoolTask>>,
    worker_handles: Vec<JoinHandle<()>>,
    stats: Arc<SharedPoolStats>,
}

impl WorkerPool {
    /// Spawns the workers.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::WorkerInitFailed` if a thread cannot be spawned.
    pub fn start(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        let (sender, receiver) = bounded::<PoolTask>(config.queue_capacity);
        let stats = Arc::new(SharedPoolStats::new());

        let mut pool = Self {
            config,
            sender: Some(sender),
            worker_handles: Vec::new(),
            stats,
        };

        for i in 0..pool.config.num_workers {
            let worker = Worker::new(format!("worker-{i}"), receiver.clone(), Arc::clone(&pool.stats));
            let handle = thread::Builder::new()
                .name(format!("partbatch-worker-{i}"))
                .spawn(move || worker.run())
                .map_err(|e| PoolError::WorkerInitFailed(e.to_string()))?;
            pool.worker_handles.push(handle);
        }

        info!(
            num_workers = pool.config.num_workers,
            queue_capacity = pool.config.queue_capacity,
            submit_policy = ?pool.config.submit_policy,
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Queues a task for execution.
    ///
    /// # Errors
    ///
    /// - `PoolError::Saturated` if the queue is full under `SubmitPolicy::Reject`.
    /// - `PoolError::ShutDown` if the pool no longer accepts tasks.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        let task: PoolTask = Box::new(task);

        match self.config.submit_policy {
            SubmitPolicy::Block => sender.send(task).map_err(|_| PoolError::ShutDown),
            SubmitPolicy::Reject => sender.try_send(task).map_err(|e| match e {
                TrySendError::Full(_) => PoolError::Saturated {
                    capacity: self.config.queue_capacity,
                },
                TrySendError::Disconnected(_) => PoolError::ShutDown,
            }),
        }
    }

    /// Stops accepting tasks, lets queued tasks drain and joins the workers.
    ///
    /// Calling this on a pool that is already shut down is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::WorkerPanicked` if any worker thread died.
    pub fn shutdown(&mut self) -> Result<(), PoolError> {
        if self.sender.take().is_none() {
            return Ok(());
        }

        info!("Initiating worker pool shutdown");

        let mut panicked = 0;
        for handle in self.worker_handles.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked during shutdown");
                panicked += 1;
            }
        }

        if panicked > 0 {
            return Err(PoolError::WorkerPanicked(panicked));
        }
        info!("Worker pool shutdown complete");
        Ok(())
    }

    /// Returns current pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.stats.to_pool_stats(self.config.num_workers)
    }

    /// Returns whether the pool accepts tasks.
    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Returns the number of workers in the pool.
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "Worker pool shutdown failed on drop");
        }
    }
}

/// A single worker thread that runs tasks from the queue.
struct Worker {
    /// Identifier used in logs.
    id: String,
    /// Shared task queue.
    receiver: Receiver<PoolTask>,
    /// Shared statistics.
    stats: Arc<SharedPoolStats>,
}

impl Worker {
    fn new(id: String, receiver: Receiver<PoolTask>, stats: Arc<SharedPoolStats>) -> Self {
        Self {
            id,
            receiver,
            stats,
        }
    }

    /// Main worker loop. Ends once the queue is closed and drained.
    fn run(self) {
        debug!(worker_id = %self.id, "Worker started");

        for task in self.receiver.iter() {
            let start_time = Instant::now();
            self.stats.increment_active();

            let result = panic::catch_unwind(AssertUnwindSafe(task));

            self.stats.decrement_active();
            let duration = start_time.elapsed();
            match result {
                Ok(()) => self.stats.record_completion(duration),
                Err(_) => {
                    self.stats.record_panic(duration);
                    error!(worker_id = %self.id, "Task panicked");
                }
            }
        }

        debug!(worker_id = %self.id, "Worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();

        assert_eq!(config.num_workers, 10);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.submit_policy, SubmitPolicy::Block);
    }

    #[test]
    fn test_worker_pool_config_builder() {
        let config = WorkerPoolConfig::new(4)
            .with_queue_capacity(2)
            .with_submit_policy(SubmitPolicy::Reject);

        assert_eq!(config.num_workers, 4);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.submit_policy, SubmitPolicy::Reject);
    }

    #[test]
    fn test_submit_policy_from_str() {
        assert_eq!("block".parse::<SubmitPolicy>().unwrap(), SubmitPolicy::Block);
        assert_eq!("REJECT".parse::<SubmitPolicy>().unwrap(), SubmitPolicy::Reject);
        assert!("drop".parse::<SubmitPolicy>().is_err());
    }

    #[test]
    fn test_pool_runs_all_tasks() {
        let mut pool = WorkerPool::start(WorkerPoolConfig::new(4).with_queue_capacity(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(pool.stats().tasks_completed, 50);
        assert!(!pool.is_running());
    }

    #[test]
    fn test_pool_bounds_concurrency() {
        let mut pool = WorkerPool::start(WorkerPoolConfig::new(3).with_queue_capacity(1)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown().unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_reject_policy_reports_saturation() {
        let mut pool = WorkerPool::start(
            WorkerPoolConfig::new(1)
                .with_queue_capacity(1)
                .with_submit_policy(SubmitPolicy::Reject),
        )
        .unwrap();

        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(0);

        // Occupy the only worker.
        pool.submit(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        })
        .unwrap();
        started_rx.recv().unwrap();

        // Fill the queue.
        pool.submit(|| {}).unwrap();

        let result = pool.submit(|| {});
        assert!(matches!(result, Err(PoolError::Saturated { capacity: 1 })));

        release_tx.send(()).unwrap();
        pool.shutdown().unwrap();
        assert_eq!(pool.stats().tasks_completed, 2);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut pool = WorkerPool::start(WorkerPoolConfig::new(1)).unwrap();
        pool.shutdown().unwrap();
        pool.shutdown().unwrap();

        assert!(matches!(pool.submit(|| {}), Err(PoolError::ShutDown)));
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let mut pool = WorkerPool::start(WorkerPoolConfig::new(1)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        pool.submit(|| panic!("boom")).unwrap();
        let seen_clone = Arc::clone(&seen);
        pool.submit(move || seen_clone.lock().unwrap().push("after"))
            .unwrap();

        pool.shutdown().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["after"]);

        let stats = pool.stats();
        assert_eq!(stats.tasks_panicked, 1);
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.total_processed(), 2);
    }

    #[test]
    fn test_drop_joins_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::start(WorkerPoolConfig::new(2)).unwrap();
            for _ in 0..5 {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(2));
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_pool_error_display() {
        let err = PoolError::Saturated { capacity: 10 };
        assert!(err.to_string().contains("saturated"));
        assert!(err.to_string().contains("10"));

        let err = PoolError::ShutDown;
        assert!(err.to_string().contains("shut down"));

        let err = PoolError::WorkerPanicked(2);
        assert!(err.to_string().contains('2'));
    }
}
