//! Command-line interface for partbatch.
//!
//! Provides commands for running a job, previewing its partitions and
//! cleaning stale outputs.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
