//! Partition planner.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::PlanError;

use super::naming::{output_filename, DEFAULT_OUTPUT_MARKER};

/// Prefix of generated partition ids.
const PARTITION_KEY: &str = "partition";

/// One independently processable unit of work: a single input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTask {
    /// Identifier, unique within one plan (`partition0`, `partition1`, ...).
    pub id: String,
    /// Absolute path of the input file.
    pub input_path: PathBuf,
    /// File name (not path) of the partition's output.
    pub output_filename: String,
    /// Header line written at the top of the output.
    pub header_text: String,
}

/// Where the output header comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderSource {
    /// Carry the input file's first line.
    #[default]
    FromInput,
    /// Use a fixed header line for every output.
    Template(String),
}

/// Plans one partition per input file matching a pattern.
#[derive(Debug, Clone)]
pub struct PartitionPlanner {
    marker: String,
    header_source: HeaderSource,
}

impl Default for PartitionPlanner {
    fn default() -> Self {
        Self {
            marker: DEFAULT_OUTPUT_MARKER.to_string(),
            header_source: HeaderSource::FromInput,
        }
    }
}

impl PartitionPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output file name marker.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Sets the header source.
    pub fn with_header_source(mut self, header_source: HeaderSource) -> Self {
        self.header_source = header_source;
        self
    }

    /// Enumerates files directly inside `input_dir` whose name matches
    /// `pattern` and derives their tasks, ordered by file name.
    ///
    /// # Errors
    ///
    /// - `PlanError::ResourceResolution` if the pattern is invalid or the
    ///   directory cannot be listed.
    /// - `PlanError::MissingResource` if a listed file vanished before it
    ///   could be inspected.
    pub fn plan(&self, input_dir: &Path, pattern: &str) -> Result<Vec<PartitionTask>, PlanError> {
        let matcher = Pattern::new(pattern).map_err(|e| PlanError::ResourceResolution {
            dir: input_dir.to_path_buf(),
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        if !input_dir.is_dir() {
            return Err(PlanError::ResourceResolution {
                dir: input_dir.to_path_buf(),
                pattern: pattern.to_string(),
                reason: "not a readable directory".to_string(),
            });
        }

        let mut tasks = Vec::new();
        let entries = WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in entries {
            let entry = entry.map_err(|e| PlanError::ResourceResolution {
                dir: input_dir.to_path_buf(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

            let name = entry.file_name().to_string_lossy();
            if !matcher.matches(&name) {
                continue;
            }

            let metadata = fs::metadata(entry.path()).map_err(|e| missing_or_io(e, entry.path()))?;
            if !metadata.is_file() {
                debug!(path = %entry.path().display(), "Skipping non-file entry");
                continue;
            }

            let task = self.task_for(tasks.len(), entry.path())?;
            debug!(
                task_id = %task.id,
                input = %task.input_path.display(),
                output = %task.output_filename,
                "Planned partition"
            );
            tasks.push(task);
        }

        info!(
            dir = %input_dir.display(),
            pattern = %pattern,
            partitions = tasks.len(),
            "Partition planning complete"
        );

        Ok(tasks)
    }

    fn task_for(&self, index: usize, path: &Path) -> Result<PartitionTask, PlanError> {
        let input_path = fs::canonicalize(path).map_err(|e| missing_or_io(e, path))?;
        let file_name = input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let header_text = match &self.header_source {
            HeaderSource::Template(header) => header.clone(),
            HeaderSource::FromInput => read_first_line(&input_path)?,
        };

        Ok(PartitionTask {
            id: format!("{PARTITION_KEY}{index}"),
            input_path,
            output_filename: output_filename(&file_name, &self.marker),
            header_text,
        })
    }
}

/// Reads the first line as bytes. A header that is not UTF-8 is carried
/// lossily; the reader rejects the file later.
fn read_first_line(path: &Path) -> Result<String, PlanError> {
    let file = fs::File::open(path).map_err(|e| missing_or_io(e, path))?;
    let mut line = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut line)?;
    Ok(String::from_utf8_lossy(&line)
        .trim_end_matches(['\r', '\n'])
        .to_string())
}

fn missing_or_io(err: io::Error, path: &Path) -> PlanError {
    if err.kind() == io::ErrorKind::NotFound {
        PlanError::MissingResource(path.to_path_buf())
    } else {
        PlanError::Io(err)
    }
}
