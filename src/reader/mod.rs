//! Input reading with header validation.

pub mod header;
pub mod validating;

pub use header::{AnyHeader, ExpectedHeader, HeaderPredicate, DEFAULT_EXPECTED_COLUMNS};
pub use validating::{HeaderValidatingReader, ReaderStatus};
