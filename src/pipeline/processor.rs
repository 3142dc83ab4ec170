//! Per-record transform step.

use crate::codec::Record;
use crate::error::TransformError;

/// Transforms one record before it is routed and written.
///
/// Implementations run concurrently on every worker thread.
pub trait RecordProcessor: Send + Sync {
    fn process(&self, record: Record) -> Result<Record, TransformError>;
}

impl<F> RecordProcessor for F
where
    F: Fn(Record) -> Result<Record, TransformError> + Send + Sync,
{
    fn process(&self, record: Record) -> Result<Record, TransformError> {
        self(record)
    }
}

/// Default processor: sets `value` to the upper-cased full name.
///
/// A record with a blank first or last name is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameProcessor;

impl RecordProcessor for NameProcessor {
    fn process(&self, record: Record) -> Result<Record, TransformError> {
        let first = record.first_name.trim();
        let last = record.last_name.trim();

        if first.is_empty() {
            return Err(TransformError::new("first name is empty"));
        }
        if last.is_empty() {
            return Err(TransformError::new("last name is empty"));
        }

        let value = format!("{} {}", first.to_uppercase(), last.to_uppercase());
        Ok(record.with_value(value))
    }
}
