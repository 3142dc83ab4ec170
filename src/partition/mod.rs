//! Partition planning.
//!
//! Turns an input directory and a glob-style file name pattern into one
//! [`PartitionTask`] per matching file:
//!
//! ```text
//!   input/a.csv  ──►  partition0 { input: /abs/input/a.csv, output: a-out.csv }
//!   input/b.csv  ──►  partition1 { input: /abs/input/b.csv, output: b-out.csv }
//! ```
//!
//! Planning failures are fatal to the whole job; see [`crate::error::PlanError`].

pub mod naming;
pub mod planner;

pub use naming::{
    canonical_filename, output_filename, source_filename, StaleOutputMatcher,
    DEFAULT_OUTPUT_MARKER,
};
pub use planner::{HeaderSource, PartitionPlanner, PartitionTask};
