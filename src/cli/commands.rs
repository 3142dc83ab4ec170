//! CLI command definitions for partbatch.
//!
//! This module provides the command-line interface for running a
//! partitioned job, previewing its partitions and cleaning stale outputs.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use crate::pipeline::{JobConfig, JobController, RoutingMode};
use crate::scheduler::{JobReport, SubmitPolicy};

/// Partitioned, concurrent processing of delimited files.
#[derive(Parser)]
#[command(name = "partbatch")]
#[command(about = "Process a directory of delimited files concurrently, one partition per file")]
#[command(version)]
#[command(
    long_about = "partbatch discovers input files matching a pattern, processes each file as one partition on a bounded worker pool, and writes one output file per partition.\n\nExample usage:\n  partbatch run --input-dir ./in --output-dir ./out --pattern '*.csv'\n  partbatch run input.dir=./in output.dir=./out filename.pattern=*.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the job: clean, plan and process every partition.
    Run(RunArgs),

    /// Print the partitions a run would process, without running them.
    Plan(PlanArgs),

    /// Delete stale outputs from a previous run.
    Clean(CleanArgs),
}

/// Job location arguments shared by every subcommand.
///
/// Precedence: flags and `key=value` parameters, then `PARTBATCH_*`
/// environment variables, then the config file, then defaults.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct JobArgs {
    /// YAML configuration file (can also be set via PARTBATCH_CONFIG env var).
    #[arg(short = 'c', long, env = "PARTBATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory scanned for input files.
    #[arg(short = 'i', long)]
    pub input_dir: Option<PathBuf>,

    /// Directory receiving output files.
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Glob pattern selecting input files by name (e.g. '*.csv').
    #[arg(short = 'p', long)]
    pub pattern: Option<String>,

    /// Marker inserted before the output file extension (default: -out).
    #[arg(long)]
    pub marker: Option<String>,

    /// Field delimiter (default: ,).
    #[arg(short = 'd', long)]
    pub delimiter: Option<char>,

    /// Expected input header line (default: first,last). Empty accepts any header.
    #[arg(long)]
    pub expected_header: Option<String>,

    /// Fixed output header line. Defaults to each input's own first line.
    #[arg(long)]
    pub output_header: Option<String>,

    /// Job parameters as key=value (input.dir, output.dir, filename.pattern).
    #[arg(value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

/// Arguments for `partbatch run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Number of worker threads (default: 10).
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Partitions that may wait for a free worker (default: 10).
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Records per chunk (default: 10).
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// What to do when the queue is full: block or reject.
    #[arg(long)]
    pub submit_policy: Option<SubmitPolicy>,

    /// Output routing: fixed (one output per partition) or keyed (per record).
    #[arg(long)]
    pub routing: Option<RoutingMode>,

    /// Keep stale outputs instead of deleting them first.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Output JSON report.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `partbatch plan`.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `partbatch clean`.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Glob over output file names to delete, instead of the outputs of the input pattern.
    #[arg(long)]
    pub cleanup_pattern: Option<String>,
}

/// Parse CLI arguments without running any command.
///
/// Use this when you need access to CLI arguments (e.g., log_level) before running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// This is a convenience function that parses CLI args and runs the command.
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the partbatch CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_job_command(args).await,
        Commands::Plan(args) => run_plan_command(args).await,
        Commands::Clean(args) => run_clean_command(args).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_job_command(args: RunArgs) -> anyhow::Result<()> {
    let config = build_run_config(&args)?;
    let controller = JobController::new(config);

    let cancel = controller.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling job");
            cancel.cancel();
        }
    });

    // The job runs blocking I/O on its own worker threads.
    let result = tokio::task::spawn_blocking(move || controller.run()).await;
    interrupt.abort();
    let report = result??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.all_succeeded() {
        anyhow::bail!("Job finished with status {}", report.status);
    }
    Ok(())
}

async fn run_plan_command(args: PlanArgs) -> anyhow::Result<()> {
    let config = build_config(&args.job)?;
    let tasks = JobController::new(config).plan()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    println!("{} partition(s)", tasks.len());
    for task in &tasks {
        println!(
            "  {:<12} {} -> {}",
            task.id,
            task.input_path.display(),
            task.output_filename
        );
    }
    Ok(())
}

async fn run_clean_command(args: CleanArgs) -> anyhow::Result<()> {
    let mut config = build_config(&args.job)?;
    if let Some(pattern) = args.cleanup_pattern {
        config = config.with_cleanup_pattern(pattern);
    }

    let matcher = config.stale_output_matcher()?;
    let removed = JobController::new(config).cleanup()?;
    info!(removed, matcher = %matcher, "Clean finished");
    println!("✓ Removed {removed} stale output file(s): {matcher}");
    Ok(())
}

fn print_report(report: &JobReport) {
    let mark = if report.all_succeeded() { '✓' } else { '✗' };
    println!("{mark} Job {} ({})", report.status, report.run_id);
    println!("  Partitions:      {}", report.outcomes.len());
    println!("  Records written: {}", report.total_written());
    println!("  Duration:        {} ms", report.duration().num_milliseconds());

    let skipped: Vec<_> = report.skipped_inputs().collect();
    if !skipped.is_empty() {
        println!("  Skipped inputs (header rejected):");
        for outcome in skipped {
            println!("    {}", outcome.input_path.display());
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("  Incomplete partitions:");
        for outcome in failures {
            println!(
                "    {} [{}] {}",
                outcome.input_path.display(),
                outcome.status,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(fatal) = &report.fatal {
        println!("  Fatal: {fatal}");
    }
}

// ============================================================================
// Configuration Assembly
// ============================================================================

/// Builds the job configuration from file, environment, flags and parameters.
fn build_config(args: &JobArgs) -> anyhow::Result<JobConfig> {
    let mut config = match &args.config {
        Some(path) => JobConfig::from_yaml_file(path)?,
        None => JobConfig::default(),
    };
    config.apply_env()?;

    if let Some(dir) = &args.input_dir {
        config = config.with_input_dir(dir);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(pattern) = &args.pattern {
        config = config.with_filename_pattern(pattern);
    }
    if let Some(marker) = &args.marker {
        config = config.with_output_marker(marker);
    }
    if let Some(delimiter) = args.delimiter {
        config = config.with_delimiter(delimiter);
    }
    if let Some(header) = &args.expected_header {
        config = config.with_expected_header(header);
    }
    if let Some(header) = &args.output_header {
        config = config.with_output_header(header);
    }

    let config = config.with_parameters(&args.params)?;
    config.validate()?;
    Ok(config)
}

fn build_run_config(args: &RunArgs) -> anyhow::Result<JobConfig> {
    let mut config = build_config(&args.job)?;

    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(capacity) = args.queue_capacity {
        config = config.with_queue_capacity(capacity);
    }
    if let Some(size) = args.chunk_size {
        config = config.with_chunk_size(size);
    }
    if let Some(policy) = args.submit_policy {
        config = config.with_submit_policy(policy);
    }
    if let Some(routing) = args.routing {
        config = config.with_routing(routing);
    }
    if args.no_cleanup {
        config = config.with_cleanup(false);
    }

    config.validate()?;
    Ok(config)
}
