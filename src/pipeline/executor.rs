//! Partitioned step execution.
//!
//! Every partition task runs on a worker thread as a sequence of chunks:
//! read and transform up to `chunk_size` records, write and flush them, then
//! move on. Chunks of one partition never overlap, so each output keeps the
//! input's record order whatever the pool size.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::codec::{DelimitedCodec, Record, RecordCodec};
use crate::error::{ReadError, TaskError};
use crate::output::{FixedRouter, KeyedRouter, Router, WriterCache, WriterHandle};
use crate::partition::{PartitionTask, DEFAULT_OUTPUT_MARKER};
use crate::reader::{ExpectedHeader, HeaderPredicate, HeaderValidatingReader, ReaderStatus};
use crate::scheduler::{TaskOutcome, WorkerPool};

use super::cancel::CancellationToken;
use super::config::{JobConfig, RoutingMode};
use super::processor::RecordProcessor;

/// Default number of records per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Runs partition tasks on a worker pool and collects their outcomes.
///
/// Cloning is cheap; each submitted task carries its own clone.
#[derive(Clone)]
pub struct PartitionedStepExecutor {
    cache: Arc<WriterCache>,
    processor: Arc<dyn RecordProcessor>,
    codec: Arc<dyn RecordCodec>,
    predicate: Arc<dyn HeaderPredicate>,
    routing: RoutingMode,
    marker: String,
    chunk_size: usize,
    cancel: CancellationToken,
}

/// Counters for one partition run.
#[derive(Debug, Default)]
struct Progress {
    records_read: usize,
    records_written: usize,
    header_rejected: bool,
}

impl PartitionedStepExecutor {
    /// Creates an executor with the default codec, header check, fixed
    /// routing and chunk size.
    pub fn new(cache: Arc<WriterCache>, processor: Arc<dyn RecordProcessor>) -> Self {
        Self {
            cache,
            processor,
            codec: Arc::new(DelimitedCodec::default()),
            predicate: Arc::new(ExpectedHeader::default()),
            routing: RoutingMode::Fixed,
            marker: DEFAULT_OUTPUT_MARKER.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an executor wired from a job configuration.
    pub fn from_config(
        config: &JobConfig,
        cache: Arc<WriterCache>,
        processor: Arc<dyn RecordProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(cache, processor)
            .with_codec(Arc::new(DelimitedCodec::new(config.delimiter)))
            .with_header_predicate(config.header_predicate())
            .with_routing(config.routing, config.output_marker.clone())
            .with_chunk_size(config.chunk_size)
            .with_cancellation(cancel)
    }

    pub fn with_codec(mut self, codec: Arc<dyn RecordCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_header_predicate(mut self, predicate: Arc<dyn HeaderPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Sets the routing mode and the marker keyed routing names outputs with.
    pub fn with_routing(mut self, routing: RoutingMode, marker: impl Into<String>) -> Self {
        self.routing = routing;
        self.marker = marker.into();
        self
    }

    /// Sets the chunk size. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Submits every task to `pool` and waits for all of them.
    ///
    /// Returns one outcome per task. Tasks that could not be submitted, or
    /// were skipped because of cancellation, get a failed or cancelled
    /// outcome instead of running.
    pub fn execute(&self, pool: &WorkerPool, tasks: Vec<PartitionTask>) -> Vec<TaskOutcome> {
        let total = tasks.len();
        let (tx, rx) = crossbeam_channel::unbounded::<TaskOutcome>();
        let mut outcomes = Vec::with_capacity(total);
        let mut submitted: Vec<(String, PathBuf)> = Vec::with_capacity(total);

        info!(tasks = total, workers = pool.num_workers(), "Dispatching partitions");

        for task in tasks {
            if self.cancel.is_cancelled() {
                debug!(task_id = %task.id, "Cancelled before dispatch");
                outcomes.push(TaskOutcome::failed(
                    &task.id,
                    &task.input_path,
                    &TaskError::Cancelled { records_written: 0 },
                    Duration::ZERO,
                ));
                continue;
            }

            let task_id = task.id.clone();
            let input_path = task.input_path.clone();
            let step = self.clone();
            let tx = tx.clone();

            let result = pool.submit(move || {
                let outcome = step.run_task(&task);
                // The receiver outlives every worker; a failed send means
                // the executor is gone and nobody wants the outcome.
                let _ = tx.send(outcome);
            });

            match result {
                Ok(()) => {
                    debug!(task_id = %task_id, queued = pool.queued(), "Partition submitted");
                    submitted.push((task_id, input_path));
                }
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Partition submission failed");
                    outcomes.push(TaskOutcome::failed(
                        task_id,
                        input_path,
                        &TaskError::Pool(e.to_string()),
                        Duration::ZERO,
                    ));
                }
            }
        }
        drop(tx);

        let mut reported = HashSet::with_capacity(submitted.len());
        for outcome in rx.iter() {
            reported.insert(outcome.task_id.clone());
            outcomes.push(outcome);
        }

        // A task that panicked dropped its sender without reporting.
        for (task_id, input_path) in submitted {
            if !reported.contains(&task_id) {
                warn!(task_id = %task_id, "Partition ended without reporting an outcome");
                outcomes.push(TaskOutcome::failed(
                    task_id,
                    input_path,
                    &TaskError::Pool("task panicked".to_string()),
                    Duration::ZERO,
                ));
            }
        }

        outcomes
    }

    /// Runs one partition to completion on the calling thread.
    pub fn run_task(&self, task: &PartitionTask) -> TaskOutcome {
        let started = Instant::now();
        let mut progress = Progress::default();

        debug!(
            task_id = %task.id,
            input = %task.input_path.display(),
            output = %task.output_filename,
            "Partition started"
        );

        let result = self.process_partition(task, &mut progress);
        let duration = started.elapsed();

        let mut outcome = match result {
            Ok(()) => {
                info!(
                    task_id = %task.id,
                    records_read = progress.records_read,
                    records_written = progress.records_written,
                    duration_ms = duration.as_millis() as u64,
                    "Partition completed"
                );
                TaskOutcome::completed(
                    &task.id,
                    &task.input_path,
                    progress.records_read,
                    progress.records_written,
                    duration,
                )
            }
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    input = %task.input_path.display(),
                    records_written = progress.records_written,
                    error = %e,
                    "Partition did not complete"
                );
                TaskOutcome::failed(&task.id, &task.input_path, &e, duration)
                    .with_counts(progress.records_read, progress.records_written)
            }
        };

        if progress.header_rejected {
            outcome = outcome.with_header_rejected();
        }
        outcome
    }

    fn process_partition(&self, task: &PartitionTask, progress: &mut Progress) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            return Err(TaskError::Cancelled { records_written: 0 });
        }

        let router: Box<dyn Router> = match self.routing {
            RoutingMode::Fixed => Box::new(FixedRouter::open(
                &self.cache,
                &task.output_filename,
                &task.header_text,
            )?),
            RoutingMode::Keyed => Box::new(KeyedRouter::by_source_file(
                Arc::clone(&self.cache),
                task.header_text.as_str(),
                &self.marker,
            )),
        };

        let mut reader = HeaderValidatingReader::new(
            task.input_path.clone(),
            Arc::clone(&self.predicate),
            Arc::clone(&self.codec),
        );

        if reader.open()? == ReaderStatus::HeaderInvalid {
            progress.header_rejected = true;
            reader.close();
            return Ok(());
        }

        let mut chunk: Vec<(Arc<WriterHandle>, Record)> = Vec::with_capacity(self.chunk_size);
        loop {
            if self.cancel.is_cancelled() {
                reader.close();
                return Err(TaskError::Cancelled {
                    records_written: progress.records_written,
                });
            }

            chunk.clear();
            for item in reader.by_ref().take(self.chunk_size) {
                let index = progress.records_read;
                let record = item.map_err(|e| match e {
                    ReadError::Decode { .. } => TaskError::Decode { index, source: e },
                    other => TaskError::Read(other),
                })?;
                progress.records_read += 1;

                let record = self
                    .processor
                    .process(record)
                    .map_err(|source| TaskError::Transform { index, source })?;
                let handle = router
                    .route(&record)
                    .map_err(|source| TaskError::Routing { index, source })?;
                chunk.push((handle, record));
            }

            if chunk.is_empty() {
                break;
            }
            progress.records_written += self.write_chunk(&chunk)?;
            debug!(task_id = %task.id, records_written = progress.records_written, "Chunk flushed");
        }

        reader.close();
        Ok(())
    }

    /// Writes a chunk, one batch per destination, keeping record order
    /// within each destination.
    fn write_chunk(&self, chunk: &[(Arc<WriterHandle>, Record)]) -> Result<usize, TaskError> {
        let mut groups: Vec<(&Arc<WriterHandle>, Vec<&Record>)> = Vec::new();
        for (handle, record) in chunk {
            match groups.iter_mut().find(|(h, _)| Arc::ptr_eq(h, handle)) {
                Some((_, records)) => records.push(record),
                None => groups.push((handle, vec![record])),
            }
        }

        let mut written = 0;
        for (handle, records) in groups {
            written += handle.write_batch(records, self.codec.as_ref())?;
        }
        Ok(written)
    }
}

impl std::fmt::Debug for PartitionedStepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedStepExecutor")
            .field("routing", &self.routing)
            .field("marker", &self.marker)
            .field("chunk_size", &self.chunk_size)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
