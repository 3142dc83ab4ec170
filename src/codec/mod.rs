//! Record model and line codec.
//!
//! A [`Record`] is one person row. A [`RecordCodec`] turns one line of text
//! into a record and back. The shipped [`DelimitedCodec`] splits on a single
//! delimiter and does no quoting; other dialects plug in through the trait.

use crate::error::ReadError;

/// Default field delimiter for input and output lines.
pub const DEFAULT_DELIMITER: char = ',';

/// One decoded row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub first_name: String,
    pub last_name: String,
    /// File name of the input this record was read from.
    pub source_file: Option<String>,
    /// Computed during the transform step.
    pub value: Option<String>,
}

impl Record {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            source_file: None,
            value: None,
        }
    }

    /// Sets the source file name.
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Sets the computed value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Encodes and decodes one record per line.
pub trait RecordCodec: Send + Sync {
    /// Decodes a single line. `line_number` is 1-based and only used for
    /// error reporting.
    fn decode(&self, line: &str, line_number: usize) -> Result<Record, ReadError>;

    /// Encodes a record without a trailing newline.
    fn encode(&self, record: &Record) -> String;
}

/// Split-on-delimiter codec.
///
/// Input lines carry `firstName<d>lastName`; extra trailing fields are
/// ignored. Output lines carry `firstName<d>lastName<d>value`, with an empty
/// value field when none was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedCodec {
    delimiter: char,
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl DelimitedCodec {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

impl RecordCodec for DelimitedCodec {
    fn decode(&self, line: &str, line_number: usize) -> Result<Record, ReadError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(self.delimiter);

        let first_name = fields.next().map(str::trim).unwrap_or_default();
        let last_name = fields.next().map(str::trim).ok_or_else(|| ReadError::Decode {
            line: line_number,
            reason: format!(
                "expected 2 fields separated by '{}', found 1",
                self.delimiter
            ),
        })?;

        Ok(Record::new(first_name, last_name))
    }

    fn encode(&self, record: &Record) -> String {
        let d = self.delimiter;
        format!(
            "{}{d}{}{d}{}",
            record.first_name,
            record.last_name,
            record.value.as_deref().unwrap_or_default()
        )
    }
}
