//! Header predicates.

use crate::codec::DEFAULT_DELIMITER;

/// Default expected input columns.
pub const DEFAULT_EXPECTED_COLUMNS: [&str; 2] = ["first", "last"];

/// Decides whether a file's first line is an acceptable header.
pub trait HeaderPredicate: Send + Sync {
    fn accepts(&self, header: &str) -> bool;
}

impl<F> HeaderPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accepts(&self, header: &str) -> bool {
        self(header)
    }
}

/// Accepts any non-empty first line.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyHeader;

impl HeaderPredicate for AnyHeader {
    fn accepts(&self, header: &str) -> bool {
        !header.trim().is_empty()
    }
}

/// Accepts a header whose fields match the expected column names.
///
/// Fields are trimmed and compared case-insensitively; the count must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedHeader {
    columns: Vec<String>,
    delimiter: char,
}

impl Default for ExpectedHeader {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_COLUMNS)
    }
}

impl ExpectedHeader {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Parses a header line such as `first,last` into expected columns.
    pub fn parse(header: &str, delimiter: char) -> Self {
        Self::new(header.split(delimiter).map(str::trim)).with_delimiter(delimiter)
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl HeaderPredicate for ExpectedHeader {
    fn accepts(&self, header: &str) -> bool {
        let header = header.trim_start_matches('\u{feff}').trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = header.split(self.delimiter).map(str::trim).collect();

        fields.len() == self.columns.len()
            && fields
                .iter()
                .zip(&self.columns)
                .all(|(found, expected)| found.eq_ignore_ascii_case(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_header_default() {
        let predicate = ExpectedHeader::default();
        assert!(predicate.accepts("first,last"));
        assert!(predicate.accepts("First , LAST\r\n"));
        assert!(predicate.accepts("\u{feff}first,last"));
        assert!(!predicate.accepts("Jo,Bloggs"));
        assert!(!predicate.accepts("first,last,extra"));
        assert!(!predicate.accepts(""));
    }

    #[test]
    fn test_expected_header_parse() {
        let predicate = ExpectedHeader::parse("firstName;lastName", ';');
        assert_eq!(predicate.columns(), ["firstName", "lastName"]);
        assert!(predicate.accepts("firstname;lastname"));
        assert!(!predicate.accepts("firstname,lastname"));
    }

    #[test]
    fn test_any_header() {
        assert!(AnyHeader.accepts("whatever"));
        assert!(!AnyHeader.accepts("   "));
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = |line: &str| line.starts_with('#');
        assert!(predicate.accepts("# header"));
        assert!(!predicate.accepts("first,last"));
    }
}
