//! Record-to-destination routing.
//!
//! [`FixedRouter`] sends every record of a partition to the partition's own
//! output. [`KeyedRouter`] computes an output key per record. Both resolve
//! writers through the shared [`WriterCache`], so the writer lifecycle is the
//! same for static and dynamic outputs.

use std::fmt;
use std::sync::Arc;

use crate::codec::Record;
use crate::error::WriterError;
use crate::partition::output_filename;

use super::cache::{WriterCache, WriterHandle};

/// Selects the output writer for a record.
pub trait Router: Send + Sync {
    fn route(&self, record: &Record) -> Result<Arc<WriterHandle>, WriterError>;
}

/// Routes all records to one precomputed output.
#[derive(Debug)]
pub struct FixedRouter {
    handle: Arc<WriterHandle>,
}

impl FixedRouter {
    /// Resolves the partition's output right away, so the file exists even
    /// when the partition produces no records.
    pub fn open(cache: &WriterCache, output_filename: &str, header: &str) -> Result<Self, WriterError> {
        Ok(Self {
            handle: cache.resolve(output_filename, header)?,
        })
    }
}

impl Router for FixedRouter {
    fn route(&self, _record: &Record) -> Result<Arc<WriterHandle>, WriterError> {
        Ok(Arc::clone(&self.handle))
    }
}

type KeyFn = dyn Fn(&Record) -> Option<String> + Send + Sync;

/// Routes each record to the output named by a key computed from it.
pub struct KeyedRouter {
    cache: Arc<WriterCache>,
    header: String,
    key_fn: Arc<KeyFn>,
}

impl KeyedRouter {
    pub fn new<F>(cache: Arc<WriterCache>, header: impl Into<String>, key_fn: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            cache,
            header: header.into(),
            key_fn: Arc::new(key_fn),
        }
    }

    /// Keys each record by its source file name, named with `marker`
    /// (`a.csv` routes to `a-out.csv`).
    pub fn by_source_file(cache: Arc<WriterCache>, header: impl Into<String>, marker: &str) -> Self {
        let marker = marker.to_string();
        Self::new(cache, header, move |record| {
            record
                .source_file
                .as_deref()
                .map(|source| output_filename(source, &marker))
        })
    }

    /// The output key for a record, if it has one.
    pub fn key_for(&self, record: &Record) -> Option<String> {
        (self.key_fn)(record)
    }
}

impl Router for KeyedRouter {
    fn route(&self, record: &Record) -> Result<Arc<WriterHandle>, WriterError> {
        let key = self.key_for(record).ok_or_else(|| {
            WriterError::MissingKey(format!("{} {}", record.first_name, record.last_name))
        })?;
        self.cache.resolve(&key, &self.header)
    }
}

impl fmt::Debug for KeyedRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedRouter")
            .field("cache", &self.cache)
            .field("header", &self.header)
            .finish()
    }
}
