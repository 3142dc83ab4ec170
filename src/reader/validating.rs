//! Header-validating file reader.
//!
//! Reader lifecycle:
//!
//! ```text
//!   Unopened ──open()──► Reading ──EOF / close()──► Closed
//!                   └──► HeaderInvalid ──close()──► Closed
//! ```
//!
//! A reader whose header fails the predicate does not raise: it reports end
//! of stream on every read, so one malformed file never stops its siblings.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{Record, RecordCodec};
use crate::error::ReadError;

use super::header::HeaderPredicate;

/// Observable reader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderStatus {
    Unopened,
    Reading,
    HeaderInvalid,
    Closed,
}

impl fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderStatus::Unopened => write!(f, "unopened"),
            ReaderStatus::Reading => write!(f, "reading"),
            ReaderStatus::HeaderInvalid => write!(f, "header_invalid"),
            ReaderStatus::Closed => write!(f, "closed"),
        }
    }
}

enum State {
    Unopened,
    Reading {
        lines: Lines<BufReader<File>>,
        line_number: usize,
    },
    HeaderInvalid,
    Closed,
}

/// Reads records from one input file after validating its header line.
pub struct HeaderValidatingReader {
    path: PathBuf,
    source_file: String,
    predicate: Arc<dyn HeaderPredicate>,
    codec: Arc<dyn RecordCodec>,
    header: Option<String>,
    state: State,
}

impl HeaderValidatingReader {
    pub fn new(
        path: impl Into<PathBuf>,
        predicate: Arc<dyn HeaderPredicate>,
        codec: Arc<dyn RecordCodec>,
    ) -> Self {
        let path = path.into();
        let source_file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path,
            source_file,
            predicate,
            codec,
            header: None,
            state: State::Unopened,
        }
    }

    /// Opens the file and validates its first line.
    ///
    /// A rejected, undecodable or missing header moves the reader to `HeaderInvalid`
    /// rather than returning an error. Opening an already opened reader is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ReadError::Io` if the file cannot be opened or read.
    pub fn open(&mut self) -> Result<ReaderStatus, ReadError> {
        if !matches!(self.state, State::Unopened) {
            return Ok(self.status());
        }

        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut first = Vec::new();

        self.state = if reader.read_until(b'\n', &mut first)? == 0 {
            warn!(path = %self.path.display(), "Empty input, no header line");
            State::HeaderInvalid
        } else {
            match String::from_utf8(first) {
                Ok(line) => {
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    let valid = self.predicate.accepts(&line);
                    self.header = Some(line);
                    if valid {
                        debug!(path = %self.path.display(), "Header accepted");
                        State::Reading {
                            lines: reader.lines(),
                            line_number: 1,
                        }
                    } else {
                        warn!(
                            path = %self.path.display(),
                            header = ?self.header,
                            "Header rejected, file will produce no records"
                        );
                        State::HeaderInvalid
                    }
                }
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err.utf8_error(),
                        "Header is not valid UTF-8, file will produce no records"
                    );
                    State::HeaderInvalid
                }
            }
        };

        Ok(self.status())
    }

    /// Releases the underlying file. Safe to call more than once.
    pub fn close(&mut self) {
        if !matches!(self.state, State::Closed) {
            debug!(path = %self.path.display(), "Closing reader");
        }
        self.state = State::Closed;
    }

    pub fn status(&self) -> ReaderStatus {
        match self.state {
            State::Unopened => ReaderStatus::Unopened,
            State::Reading { .. } => ReaderStatus::Reading,
            State::HeaderInvalid => ReaderStatus::HeaderInvalid,
            State::Closed => ReaderStatus::Closed,
        }
    }

    /// Whether the header was rejected when the reader was opened.
    pub fn header_invalid(&self) -> bool {
        matches!(self.state, State::HeaderInvalid)
    }

    /// The first line of the file, once opened.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for HeaderValidatingReader {
    type Item = Result<Record, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (lines, line_number) = match &mut self.state {
            State::Unopened => return Some(Err(ReadError::NotOpen(self.path.clone()))),
            State::HeaderInvalid | State::Closed => return None,
            State::Reading { lines, line_number } => (lines, line_number),
        };

        loop {
            match lines.next() {
                None => {
                    self.state = State::Closed;
                    return None;
                }
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(line)) => {
                    *line_number += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = self
                        .codec
                        .decode(&line, *line_number)
                        .map(|record| record.with_source_file(self.source_file.as_str()));
                    return Some(record);
                }
            }
        }
    }
}

impl fmt::Debug for HeaderValidatingReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderValidatingReader")
            .field("path", &self.path)
            .field("status", &self.status())
            .field("header", &self.header)
            .finish()
    }
}
