//! Job configuration.
//!
//! This module provides the settings for one job run: where inputs come
//! from and outputs go, pool sizing, chunking, routing, header handling and
//! stale-output cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::DEFAULT_DELIMITER;
use crate::error::PlanError;
use crate::partition::{HeaderSource, StaleOutputMatcher, DEFAULT_OUTPUT_MARKER};
use crate::reader::{AnyHeader, ExpectedHeader, HeaderPredicate, DEFAULT_EXPECTED_COLUMNS};
use crate::scheduler::{SubmitPolicy, WorkerPoolConfig};

/// Job parameter naming the input directory.
pub const PARAM_INPUT_DIR: &str = "input.dir";
/// Job parameter naming the output directory.
pub const PARAM_OUTPUT_DIR: &str = "output.dir";
/// Job parameter naming the input filename pattern.
pub const PARAM_FILENAME_PATTERN: &str = "filename.pattern";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How records are routed to output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Each partition writes to its own precomputed output.
    #[default]
    Fixed,
    /// Each record picks its output from its source file name.
    Keyed,
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::Fixed => write!(f, "fixed"),
            RoutingMode::Keyed => write!(f, "keyed"),
        }
    }
}

impl std::str::FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(RoutingMode::Fixed),
            "keyed" => Ok(RoutingMode::Keyed),
            other => Err(format!("unknown routing mode '{other}' (expected fixed or keyed)")),
        }
    }
}

/// Configuration for one job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    // Job parameters
    /// Directory scanned for input files.
    pub input_dir: PathBuf,
    /// Directory receiving output files.
    pub output_dir: PathBuf,
    /// Glob pattern selecting input files by name.
    pub filename_pattern: String,

    // Execution settings
    /// Number of worker threads.
    pub num_workers: usize,
    /// Tasks that may wait for a free worker.
    pub queue_capacity: usize,
    /// Records per chunk (one flush per chunk).
    pub chunk_size: usize,
    /// Behaviour when the queue is full.
    pub submit_policy: SubmitPolicy,

    // Output settings
    /// Output routing mode.
    pub routing: RoutingMode,
    /// Marker inserted before the output file extension.
    pub output_marker: String,
    /// Field delimiter of input and output lines.
    pub delimiter: char,
    /// Expected input header columns. Empty accepts any non-empty header.
    pub expected_header: Vec<String>,
    /// Fixed output header. `None` carries the input's first line.
    pub output_header: Option<String>,

    // Cleanup settings
    /// Delete stale outputs before planning.
    pub cleanup: bool,
    /// Glob over output file names replacing the default stale-output test.
    ///
    /// By default a file is stale when removing the output marker from its
    /// name gives a name matching `filename_pattern`.
    pub cleanup_pattern: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            filename_pattern: "*.csv".to_string(),

            num_workers: 10,
            queue_capacity: 10,
            chunk_size: 10,
            submit_policy: SubmitPolicy::Block,

            routing: RoutingMode::Fixed,
            output_marker: DEFAULT_OUTPUT_MARKER.to_string(),
            delimiter: DEFAULT_DELIMITER,
            expected_header: DEFAULT_EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            output_header: None,

            cleanup: true,
            cleanup_pattern: None,
        }
    }
}

impl JobConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PARTBATCH_INPUT_DIR`: Input directory
    /// - `PARTBATCH_OUTPUT_DIR`: Output directory
    /// - `PARTBATCH_FILENAME_PATTERN`: Input filename pattern (default: *.csv)
    /// - `PARTBATCH_WORKERS`: Worker threads (default: 10)
    /// - `PARTBATCH_QUEUE_CAPACITY`: Queue depth (default: 10)
    /// - `PARTBATCH_CHUNK_SIZE`: Records per chunk (default: 10)
    /// - `PARTBATCH_SUBMIT_POLICY`: block or reject (default: block)
    /// - `PARTBATCH_ROUTING`: fixed or keyed (default: fixed)
    /// - `PARTBATCH_OUTPUT_MARKER`: Output name marker (default: -out)
    /// - `PARTBATCH_DELIMITER`: Field delimiter (default: ,)
    /// - `PARTBATCH_EXPECTED_HEADER`: Expected header line (default: first,last)
    /// - `PARTBATCH_OUTPUT_HEADER`: Fixed output header line
    /// - `PARTBATCH_CLEANUP`: Delete stale outputs first (default: true)
    /// - `PARTBATCH_CLEANUP_PATTERN`: Cleanup pattern override
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file. Missing fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Parse` if it is not valid YAML for this type.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `PARTBATCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Job parameters
        if let Ok(val) = std::env::var("PARTBATCH_INPUT_DIR") {
            self.input_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PARTBATCH_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PARTBATCH_FILENAME_PATTERN") {
            self.filename_pattern = val;
        }

        // Execution settings
        if let Ok(val) = std::env::var("PARTBATCH_WORKERS") {
            self.num_workers = parse_env_value(&val, "PARTBATCH_WORKERS")?;
        }

        if let Ok(val) = std::env::var("PARTBATCH_QUEUE_CAPACITY") {
            self.queue_capacity = parse_env_value(&val, "PARTBATCH_QUEUE_CAPACITY")?;
        }

        if let Ok(val) = std::env::var("PARTBATCH_CHUNK_SIZE") {
            self.chunk_size = parse_env_value(&val, "PARTBATCH_CHUNK_SIZE")?;
        }

        if let Ok(val) = std::env::var("PARTBATCH_SUBMIT_POLICY") {
            self.submit_policy = parse_env_value(&val, "PARTBATCH_SUBMIT_POLICY")?;
        }

        // Output settings
        if let Ok(val) = std::env::var("PARTBATCH_ROUTING") {
            self.routing = parse_env_value(&val, "PARTBATCH_ROUTING")?;
        }

        if let Ok(val) = std::env::var("PARTBATCH_OUTPUT_MARKER") {
            self.output_marker = val;
        }

        if let Ok(val) = std::env::var("PARTBATCH_DELIMITER") {
            self.delimiter = parse_env_value(&val, "PARTBATCH_DELIMITER")?;
        }

        if let Ok(val) = std::env::var("PARTBATCH_EXPECTED_HEADER") {
            self.expected_header = split_columns(&val, self.delimiter);
        }

        if let Ok(val) = std::env::var("PARTBATCH_OUTPUT_HEADER") {
            self.output_header = Some(val);
        }

        // Cleanup settings
        if let Ok(val) = std::env::var("PARTBATCH_CLEANUP") {
            self.cleanup = parse_env_bool(&val, "PARTBATCH_CLEANUP")?;
        }

        if let Ok(val) = std::env::var("PARTBATCH_CLEANUP_PATTERN") {
            self.cleanup_pattern = Some(val);
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// Job parameters are checked separately by [`JobConfig::validate_parameters`],
    /// since they are usually supplied after the rest of the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::ValidationFailed(
                "num_workers must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.output_marker.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_marker cannot be empty".to_string(),
            ));
        }

        if matches!(self.delimiter, '\n' | '\r') {
            return Err(ConfigError::ValidationFailed(
                "delimiter cannot be a line break".to_string(),
            ));
        }

        if self.expected_header.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "expected_header cannot contain empty columns".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks that every job parameter is present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidParameter` naming the first bad parameter.
    pub fn validate_parameters(&self) -> Result<(), PlanError> {
        let params = [
            (PARAM_INPUT_DIR, self.input_dir.to_string_lossy()),
            (PARAM_OUTPUT_DIR, self.output_dir.to_string_lossy()),
            (PARAM_FILENAME_PATTERN, self.filename_pattern.as_str().into()),
        ];

        for (name, value) in params {
            if value.trim().is_empty() {
                return Err(PlanError::InvalidParameter {
                    name: name.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Applies one `key=value` job parameter.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidParameter` for malformed pairs or unknown keys.
    pub fn apply_parameter(&mut self, pair: &str) -> Result<(), PlanError> {
        let (key, value) = pair.split_once('=').ok_or_else(|| PlanError::InvalidParameter {
            name: pair.to_string(),
            reason: "expected key=value".to_string(),
        })?;
        let value = value.trim();

        match key.trim() {
            PARAM_INPUT_DIR => self.input_dir = PathBuf::from(value),
            PARAM_OUTPUT_DIR => self.output_dir = PathBuf::from(value),
            PARAM_FILENAME_PATTERN => self.filename_pattern = value.to_string(),
            other => {
                return Err(PlanError::InvalidParameter {
                    name: other.to_string(),
                    reason: format!(
                        "unknown parameter (expected {PARAM_INPUT_DIR}, {PARAM_OUTPUT_DIR} or {PARAM_FILENAME_PATTERN})"
                    ),
                })
            }
        }
        Ok(())
    }

    /// Applies a sequence of `key=value` job parameters.
    ///
    /// # Errors
    ///
    /// Returns the first `PlanError::InvalidParameter` encountered.
    pub fn with_parameters<I, S>(mut self, pairs: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            self.apply_parameter(pair.as_ref())?;
        }
        Ok(self)
    }

    /// Pool configuration derived from the execution settings.
    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.num_workers)
            .with_queue_capacity(self.queue_capacity)
            .with_submit_policy(self.submit_policy)
    }

    /// Predicate applied to each input's first line.
    pub fn header_predicate(&self) -> Arc<dyn HeaderPredicate> {
        if self.expected_header.is_empty() {
            Arc::new(AnyHeader)
        } else {
            Arc::new(ExpectedHeader::new(self.expected_header.iter().cloned()).with_delimiter(self.delimiter))
        }
    }

    /// Where output headers come from.
    pub fn header_source(&self) -> HeaderSource {
        match &self.output_header {
            Some(header) => HeaderSource::Template(header.clone()),
            None => HeaderSource::FromInput,
        }
    }

    /// Matcher for the stale outputs deleted by cleanup.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::ResourceResolution` if the filename pattern or
    /// the cleanup pattern override is not a valid glob.
    pub fn stale_output_matcher(&self) -> Result<StaleOutputMatcher, PlanError> {
        let (pattern, matcher) = match &self.cleanup_pattern {
            Some(pattern) => (pattern, StaleOutputMatcher::explicit(pattern)),
            None => (
                &self.filename_pattern,
                StaleOutputMatcher::derived(&self.filename_pattern, &self.output_marker),
            ),
        };
        matcher.map_err(|e| PlanError::ResourceResolution {
            dir: self.output_dir.clone(),
            pattern: pattern.clone(),
            reason: e.to_string(),
        })
    }

    /// Builder method to set the input directory.
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    /// Builder method to set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder method to set the filename pattern.
    pub fn with_filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = pattern.into();
        self
    }

    /// Builder method to set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    /// Builder method to set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builder method to set the chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Builder method to set the submit policy.
    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.submit_policy = policy;
        self
    }

    /// Builder method to set the routing mode.
    pub fn with_routing(mut self, routing: RoutingMode) -> Self {
        self.routing = routing;
        self
    }

    /// Builder method to set the output marker.
    pub fn with_output_marker(mut self, marker: impl Into<String>) -> Self {
        self.output_marker = marker.into();
        self
    }

    /// Builder method to set the delimiter.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Builder method to set the expected header from a header line.
    pub fn with_expected_header(mut self, header: &str) -> Self {
        self.expected_header = split_columns(header, self.delimiter);
        self
    }

    /// Builder method to set a fixed output header.
    pub fn with_output_header(mut self, header: impl Into<String>) -> Self {
        self.output_header = Some(header.into());
        self
    }

    /// Builder method to enable or disable cleanup.
    pub fn with_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup = enabled;
        self
    }

    /// Builder method to override the cleanup pattern.
    pub fn with_cleanup_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.cleanup_pattern = Some(pattern.into());
        self
    }
}

/// Splits a header line into column names. A blank line yields no columns.
fn split_columns(header: &str, delimiter: char) -> Vec<String> {
    if header.trim().is_empty() {
        return Vec::new();
    }
    header.split(delimiter).map(|c| c.trim().to_string()).collect()
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = JobConfig::default();
        assert_eq!(config.num_workers, 10);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.submit_policy, SubmitPolicy::Block);
        assert_eq!(config.routing, RoutingMode::Fixed);
        assert_eq!(config.output_marker, "-out");
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.expected_header, vec!["first", "last"]);
        assert!(config.output_header.is_none());
        assert!(config.cleanup);
    }

    #[test]
    fn test_config_builder() {
        let config = JobConfig::new()
            .with_input_dir("/data/in")
            .with_output_dir("/data/out")
            .with_filename_pattern("*.txt")
            .with_workers(2)
            .with_queue_capacity(4)
            .with_chunk_size(100)
            .with_submit_policy(SubmitPolicy::Reject)
            .with_routing(RoutingMode::Keyed)
            .with_output_marker("-done")
            .with_delimiter(';')
            .with_expected_header("given;family")
            .with_output_header("first;last;value")
            .with_cleanup(false);

        assert_eq!(config.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.filename_pattern, "*.txt");
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.submit_policy, SubmitPolicy::Reject);
        assert_eq!(config.routing, RoutingMode::Keyed);
        assert_eq!(config.expected_header, vec!["given", "family"]);
        assert_eq!(
            config.header_source(),
            HeaderSource::Template("first;last;value".to_string())
        );
        assert!(!config.cleanup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_workers() {
        let result = JobConfig::default().with_workers(0).validate();
        assert!(result.unwrap_err().to_string().contains("num_workers"));
    }

    #[test]
    fn test_validation_zero_queue_capacity() {
        let result = JobConfig::default().with_queue_capacity(0).validate();
        assert!(result.unwrap_err().to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_validation_zero_chunk_size() {
        let result = JobConfig::default().with_chunk_size(0).validate();
        assert!(result.unwrap_err().to_string().contains("chunk_size"));
    }

    #[test]
    fn test_validation_empty_marker() {
        let result = JobConfig::default().with_output_marker("").validate();
        assert!(result.unwrap_err().to_string().contains("output_marker"));
    }

    #[test]
    fn test_validation_newline_delimiter() {
        let result = JobConfig::default().with_delimiter('\n').validate();
        assert!(result.unwrap_err().to_string().contains("delimiter"));
    }

    #[test]
    fn test_validate_parameters() {
        let config = JobConfig::default()
            .with_input_dir("/in")
            .with_output_dir("/out");
        assert!(config.validate_parameters().is_ok());

        let err = JobConfig::default()
            .with_output_dir("/out")
            .validate_parameters()
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { ref name, .. } if name == PARAM_INPUT_DIR));

        let err = config.with_filename_pattern("  ").validate_parameters().unwrap_err();
        assert!(err.to_string().contains(PARAM_FILENAME_PATTERN));
    }

    #[test]
    fn test_with_parameters() {
        let config = JobConfig::default()
            .with_parameters(["input.dir=/data/in", "output.dir = /data/out", "filename.pattern=*.txt"])
            .unwrap();

        assert_eq!(config.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.filename_pattern, "*.txt");
    }

    #[test]
    fn test_with_parameters_rejects_bad_pairs() {
        let err = JobConfig::default().with_parameters(["input.dir"]).unwrap_err();
        assert!(err.to_string().contains("key=value"));

        let err = JobConfig::default().with_parameters(["output=/x"]).unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { ref name, .. } if name == "output"));
    }

    #[test]
    fn test_header_predicate() {
        let config = JobConfig::default();
        let predicate = config.header_predicate();
        assert!(predicate.accepts("first,last"));
        assert!(!predicate.accepts("name,surname"));

        let mut config = JobConfig::default();
        config.expected_header.clear();
        let predicate = config.header_predicate();
        assert!(predicate.accepts("name,surname"));
        assert!(!predicate.accepts(""));
    }

    #[test]
    fn test_stale_output_matcher() {
        let config = JobConfig::default().with_filename_pattern("*");
        let matcher = config.stale_output_matcher().unwrap();
        assert!(matcher.matches("a-out.csv"));
        assert!(!matcher.matches("a.csv"));

        let config = config.with_filename_pattern("data_*").with_output_marker("_done");
        let matcher = config.stale_output_matcher().unwrap();
        assert!(matcher.matches("data_7_done.csv"));
        assert!(!matcher.matches("data_7-out.csv"));

        let config = config.with_cleanup_pattern("stale-*");
        let matcher = config.stale_output_matcher().unwrap();
        assert!(matcher.matches("stale-a.csv"));
        assert!(!matcher.matches("data_7_done.csv"));
    }

    #[test]
    fn test_stale_output_matcher_invalid_pattern() {
        let config = JobConfig::default().with_filename_pattern("[*.csv");
        assert!(matches!(
            config.stale_output_matcher(),
            Err(PlanError::ResourceResolution { .. })
        ));

        let config = JobConfig::default().with_cleanup_pattern("[bad");
        assert!(matches!(
            config.stale_output_matcher(),
            Err(PlanError::ResourceResolution { pattern, .. }) if pattern == "[bad"
        ));
    }

    #[test]
    fn test_pool_config() {
        let pool = JobConfig::default()
            .with_workers(3)
            .with_queue_capacity(7)
            .with_submit_policy(SubmitPolicy::Reject)
            .pool_config();

        assert_eq!(pool.num_workers, 3);
        assert_eq!(pool.queue_capacity, 7);
        assert_eq!(pool.submit_policy, SubmitPolicy::Reject);
    }

    #[test]
    fn test_from_yaml_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("job.yaml");
        std::fs::write(
            &path,
            "input_dir: /data/in\noutput_dir: /data/out\nnum_workers: 4\nrouting: keyed\nsubmit_policy: reject\ndelimiter: ';'\n",
        )
        .unwrap();

        let config = JobConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.routing, RoutingMode::Keyed);
        assert_eq!(config.submit_policy, SubmitPolicy::Reject);
        assert_eq!(config.delimiter, ';');
        // Unset fields keep defaults.
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.filename_pattern, "*.csv");
    }

    #[test]
    fn test_from_yaml_file_invalid() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("job.yaml");
        std::fs::write(&path, "num_workers: many\n").unwrap();

        let err = JobConfig::from_yaml_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        std::fs::write(&path, "chunk_size: 0\n").unwrap();
        let err = JobConfig::from_yaml_file(&path).unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_routing_mode_from_str() {
        assert_eq!("fixed".parse::<RoutingMode>().unwrap(), RoutingMode::Fixed);
        assert_eq!("Keyed".parse::<RoutingMode>().unwrap(), RoutingMode::Keyed);
        assert!("random".parse::<RoutingMode>().is_err());
        assert_eq!(RoutingMode::Keyed.to_string(), "keyed");
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(parse_env_value::<usize>("12", "test").unwrap(), 12);
        assert_eq!(parse_env_value::<char>(";", "test").unwrap(), ';');
        assert!(parse_env_value::<char>(";;", "test").is_err());
        assert!(parse_env_value::<RoutingMode>("round_robin", "test").is_err());
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("true", "test").unwrap());
        assert!(parse_env_bool("1", "test").unwrap());
        assert!(parse_env_bool("yes", "test").unwrap());
        assert!(parse_env_bool("on", "test").unwrap());
        assert!(parse_env_bool("TRUE", "test").unwrap());

        assert!(!parse_env_bool("false", "test").unwrap());
        assert!(!parse_env_bool("0", "test").unwrap());
        assert!(!parse_env_bool("no", "test").unwrap());
        assert!(!parse_env_bool("off", "test").unwrap());

        assert!(parse_env_bool("invalid", "test").is_err());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "KEY".to_string(),
            message: "bad value".to_string(),
        };
        assert!(err.to_string().contains("KEY"));
        assert!(err.to_string().contains("bad value"));

        let err = ConfigError::ValidationFailed("test failure".to_string());
        assert!(err.to_string().contains("test failure"));
    }
}
