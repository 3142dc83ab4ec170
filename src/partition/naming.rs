//! Output file naming.

use std::fmt;
use std::path::Path;

use glob::{Pattern, PatternError};

/// Default marker inserted between an input's stem and its extension.
pub const DEFAULT_OUTPUT_MARKER: &str = "-out";

/// Derives an output file name from an input file name.
///
/// Only the last path component is used. The extension is stripped, the
/// marker appended, and the extension reinstated:
/// `a.csv` becomes `a-out.csv`, `notes` becomes `notes-out`.
pub fn output_filename(input: &str, marker: &str) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    match path.extension() {
        Some(ext) => format!("{stem}{marker}.{}", ext.to_string_lossy()),
        None => format!("{stem}{marker}"),
    }
}

/// Canonical file name for an output key: its last path component.
///
/// Two keys with the same canonical name address the same output file.
pub fn canonical_filename(key: &str) -> Option<String> {
    Path::new(key)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Recovers the input file name an output name was derived from.
///
/// Returns `None` when `output` is not of the form produced by
/// [`output_filename`] with this marker.
pub fn source_filename(output: &str, marker: &str) -> Option<String> {
    if marker.is_empty() {
        return None;
    }
    let path = Path::new(output);
    let stem = path.file_stem()?.to_str()?;
    let source_stem = stem.strip_suffix(marker).filter(|s| !s.is_empty())?;

    let source = match path.extension() {
        Some(ext) => format!("{source_stem}.{}", ext.to_str()?),
        None => source_stem.to_string(),
    };
    (output_filename(&source, marker) == output).then_some(source)
}

/// Decides which files in an output directory are stale outputs.
#[derive(Debug, Clone)]
pub enum StaleOutputMatcher {
    /// Output names whose source name matches the input pattern.
    Derived { input: Pattern, marker: String },
    /// Output names matching an explicit pattern.
    Explicit(Pattern),
}

impl StaleOutputMatcher {
    /// Matches the outputs a plan over `input_pattern` would produce.
    pub fn derived(input_pattern: &str, marker: &str) -> Result<Self, PatternError> {
        Ok(Self::Derived {
            input: Pattern::new(input_pattern)?,
            marker: marker.to_string(),
        })
    }

    pub fn explicit(pattern: &str) -> Result<Self, PatternError> {
        Ok(Self::Explicit(Pattern::new(pattern)?))
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Self::Derived { input, marker } => {
                source_filename(file_name, marker).is_some_and(|source| input.matches(&source))
            }
            Self::Explicit(pattern) => pattern.matches(file_name),
        }
    }
}

impl fmt::Display for StaleOutputMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Derived { input, marker } => {
                write!(f, "outputs of '{}' (marker '{marker}')", input.as_str())
            }
            Self::Explicit(pattern) => write!(f, "'{}'", pattern.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_filename_with_extension() {
        assert_eq!(output_filename("a.csv", DEFAULT_OUTPUT_MARKER), "a-out.csv");
        assert_eq!(
            output_filename("people.2024.csv", DEFAULT_OUTPUT_MARKER),
            "people.2024-out.csv"
        );
    }

    #[test]
    fn test_output_filename_without_extension() {
        assert_eq!(output_filename("notes", DEFAULT_OUTPUT_MARKER), "notes-out");
    }

    #[test]
    fn test_output_filename_uses_last_component() {
        assert_eq!(
            output_filename("/data/in/b.csv", DEFAULT_OUTPUT_MARKER),
            "b-out.csv"
        );
    }

    #[test]
    fn test_output_filename_custom_marker() {
        assert_eq!(output_filename("a.csv", ".processed"), "a.processed.csv");
    }

    #[test]
    fn test_source_filename() {
        assert_eq!(source_filename("a-out.csv", "-out").as_deref(), Some("a.csv"));
        assert_eq!(source_filename("notes-out", "-out").as_deref(), Some("notes"));
        assert_eq!(
            source_filename("people.2024-out.csv", "-out").as_deref(),
            Some("people.2024.csv")
        );
        assert_eq!(source_filename("a.processed.csv", ".processed").as_deref(), Some("a.csv"));
        assert_eq!(source_filename("keep.csv", "-out"), None);
        assert_eq!(source_filename("-out.csv", "-out"), None);
        assert_eq!(source_filename("a-out.csv", ""), None);
    }

    #[test]
    fn test_stale_matcher_star_pattern() {
        let matcher = StaleOutputMatcher::derived("*", "-out").unwrap();
        assert!(matcher.matches("a-out.csv"));
        assert!(matcher.matches("notes-out"));
        assert!(!matcher.matches("a.csv"));
        assert!(!matcher.matches("summary.txt"));
    }

    #[test]
    fn test_stale_matcher_prefix_pattern() {
        let matcher = StaleOutputMatcher::derived("data_*", "-out").unwrap();
        assert!(matcher.matches("data_1-out.csv"));
        assert!(matcher.matches("data_2-out"));
        assert!(!matcher.matches("other-out.csv"));
        assert!(!matcher.matches("data_1.csv"));
    }

    #[test]
    fn test_stale_matcher_extension_pattern() {
        let matcher = StaleOutputMatcher::derived("*.csv", "-out").unwrap();
        assert!(matcher.matches("a-out.csv"));
        assert!(!matcher.matches("a-out.txt"));
        assert!(!matcher.matches("keep.csv"));
    }

    #[test]
    fn test_stale_matcher_explicit_pattern() {
        let matcher = StaleOutputMatcher::explicit("stale-*").unwrap();
        assert!(matcher.matches("stale-a.csv"));
        assert!(!matcher.matches("a-out.csv"));
        assert_eq!(matcher.to_string(), "'stale-*'");

        assert!(StaleOutputMatcher::explicit("[*.csv").is_err());
        assert!(StaleOutputMatcher::derived("[*.csv", "-out").is_err());
    }

    #[test]
    fn test_canonical_filename() {
        assert_eq!(canonical_filename("a-out.csv").as_deref(), Some("a-out.csv"));
        assert_eq!(
            canonical_filename("nested/dir/a-out.csv").as_deref(),
            Some("a-out.csv")
        );
        assert_eq!(canonical_filename(""), None);
        assert_eq!(canonical_filename(".."), None);
    }
}
