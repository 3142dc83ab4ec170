//! Lazily opened, shared output writers.
//!
//! The cache hands out one [`WriterHandle`] per resolved output path. Lookup,
//! open and insert happen under a single lock, so concurrent first-time
//! resolutions of the same file never open it twice.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::codec::{Record, RecordCodec};
use crate::error::WriterError;
use crate::partition::canonical_filename;

struct HandleState {
    writer: Option<BufWriter<File>>,
    needs_header: bool,
    lines_written: u64,
}

/// One open append-mode output file, shared by every worker routing to it.
pub struct WriterHandle {
    path: PathBuf,
    header: String,
    state: Mutex<HandleState>,
}

impl WriterHandle {
    fn open(path: PathBuf, header: &str) -> Result<Self, WriterError> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        // Appending to a populated file must not repeat its header.
        let needs_header = file.metadata()?.len() == 0;

        Ok(Self {
            path,
            header: header.to_string(),
            state: Mutex::new(HandleState {
                writer: Some(BufWriter::new(file)),
                needs_header,
                lines_written: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one line per record and flushes.
    ///
    /// The header goes out first if this is the first write to a file that
    /// was empty when opened. Records are written contiguously: no other
    /// writer interleaves lines within one call.
    ///
    /// # Errors
    ///
    /// Returns `WriterError::Closed` after [`WriterCache::close_all`], or
    /// `WriterError::Io` on write failure.
    pub fn write_batch<'a, I>(&self, records: I, codec: &dyn RecordCodec) -> Result<usize, WriterError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| WriterError::Closed(self.path.clone()))?;

        let mut written = 0;
        for record in records {
            if state.needs_header {
                if !self.header.is_empty() {
                    writeln!(writer, "{}", self.header)?;
                }
                state.needs_header = false;
            }
            writeln!(writer, "{}", codec.encode(record))?;
            written += 1;
        }
        writer.flush()?;

        state.lines_written += written as u64;
        Ok(written)
    }

    /// Flushes and releases the file. Later writes fail with `Closed`.
    fn close(&self) -> Result<(), WriterError> {
        let mut state = self.lock();
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
            debug!(
                path = %self.path.display(),
                lines = state.lines_written,
                "Closed output writer"
            );
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data lines written through this handle during the run.
    pub fn lines_written(&self) -> u64 {
        self.lock().lines_written
    }

    pub fn is_closed(&self) -> bool {
        self.lock().writer.is_none()
    }
}

impl fmt::Debug for WriterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterHandle")
            .field("path", &self.path)
            .field("header", &self.header)
            .finish()
    }
}

struct CacheState {
    handles: HashMap<PathBuf, Arc<WriterHandle>>,
    open_counts: HashMap<PathBuf, usize>,
    closed: bool,
}

/// Concurrency-safe registry of output writers keyed by resolved path.
pub struct WriterCache {
    output_dir: PathBuf,
    state: Mutex<CacheState>,
}

impl WriterCache {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            state: Mutex::new(CacheState {
                handles: HashMap::new(),
                open_counts: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Target path for an output key.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, WriterError> {
        canonical_filename(key)
            .map(|name| self.output_dir.join(name))
            .ok_or_else(|| WriterError::MissingKey(key.to_string()))
    }

    /// Returns the writer for `key`, opening it on first use.
    ///
    /// `header` only applies when this call opens the file.
    ///
    /// # Errors
    ///
    /// - `WriterError::MissingKey` if the key has no file name component.
    /// - `WriterError::Closed` once the cache has been shut down.
    /// - `WriterError::DuplicateOpen` if the path was opened before but is
    ///   no longer cached (a broken invariant).
    pub fn resolve(&self, key: &str, header: &str) -> Result<Arc<WriterHandle>, WriterError> {
        let path = self.path_for(key)?;

        let mut guard = self.lock();
        let state = &mut *guard;

        if state.closed {
            return Err(WriterError::Closed(path));
        }
        if let Some(handle) = state.handles.get(&path) {
            return Ok(Arc::clone(handle));
        }

        let opens = state.open_counts.entry(path.clone()).or_insert(0);
        if *opens > 0 {
            error!(path = %path.display(), opens = *opens, "Writer already opened for this path");
            return Err(WriterError::DuplicateOpen(path));
        }

        fs::create_dir_all(&self.output_dir)?;
        let handle = Arc::new(WriterHandle::open(path.clone(), header)?);
        *opens += 1;
        state.handles.insert(path, Arc::clone(&handle));

        info!(key = %key, path = %handle.path().display(), "Opened output writer");
        Ok(handle)
    }

    /// Number of times `path` was opened during this run.
    pub fn open_count(&self, path: &Path) -> usize {
        self.lock().open_counts.get(path).copied().unwrap_or(0)
    }

    /// Number of currently cached handles.
    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Closes every cached writer exactly once and refuses new resolutions.
    ///
    /// Must run after all workers are done. A handle still held elsewhere is
    /// left open for its holder and reported as `StillInUse`.
    /// All handles are processed; the first error is returned.
    pub fn close_all(&self) -> Result<usize, WriterError> {
        let handles: Vec<(PathBuf, Arc<WriterHandle>)> = {
            let mut state = self.lock();
            state.closed = true;
            state.handles.drain().collect()
        };

        let mut closed = 0;
        let mut first_error = None;

        for (path, handle) in handles {
            let result = match Arc::try_unwrap(handle) {
                Ok(handle) => handle.close().map(|()| closed += 1),
                Err(shared) => {
                    let holders = Arc::strong_count(&shared) - 1;
                    warn!(path = %path.display(), holders, "Output writer still in use at shutdown");
                    Err(WriterError::StillInUse { path, holders })
                }
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        info!(closed, "Writer cache shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }
}

impl fmt::Debug for WriterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterCache")
            .field("output_dir", &self.output_dir)
            .field("handles", &self.len())
            .finish()
    }
}
