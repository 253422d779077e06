use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::{BatchError, BatchResult};
use crate::results::Query;

/// Turns raw input lines into the ordered, de-duplicated list of search queries
#[derive(Debug, Clone, Default)]
pub struct QueryNormalizer {
    match_extension: bool,
    default_extension: String,
}

impl QueryNormalizer {
    /// `default_extension` may be given with or without the leading dot
    pub fn new(match_extension: bool, default_extension: &str) -> Self {
        let trimmed = default_extension.trim();
        let default_extension = if trimmed.is_empty() || trimmed.starts_with('.') {
            trimmed.to_string()
        } else {
            format!(".{}", trimmed)
        };
        Self {
            match_extension,
            default_extension,
        }
    }

    /// Canonicalizes a single line, `None` for blank lines
    pub fn canonicalize(&self, line: &str) -> Option<Query> {
        let name = line.trim();
        if name.is_empty() {
            return None;
        }

        let has_explicit_extension = Path::new(name).extension().is_some();
        let text = if !self.match_extension
            && !has_explicit_extension
            && !self.default_extension.is_empty()
        {
            format!("{}{}", name, self.default_extension)
        } else {
            name.to_string()
        };

        Some(Query {
            text,
            has_explicit_extension,
        })
    }

    /// Normalizes all lines, keeping the first occurrence of each canonical query
    pub fn normalize<S: AsRef<str>>(&self, lines: &[S]) -> BatchResult<Vec<Query>> {
        let mut seen = HashSet::new();
        let queries: Vec<Query> = lines
            .iter()
            .filter_map(|line| self.canonicalize(line.as_ref()))
            .filter(|query| seen.insert(query.text.clone()))
            .collect();

        debug!(
            "Normalized {} input lines into {} queries",
            lines.len(),
            queries.len()
        );

        if queries.is_empty() {
            return Err(BatchError::NoQueries);
        }
        Ok(queries)
    }
}

/// Reads one name per line from a UTF-8 input file
pub fn read_input_file(path: &Path) -> BatchResult<Vec<String>> {
    let content = fs::read_to_string(path)?;
    // A BOM written by Windows editors would otherwise stick to the first name
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    Ok(content.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn texts(queries: &[Query]) -> Vec<&str> {
        queries.iter().map(|q| q.text.as_str()).collect()
    }

    #[test]
    fn test_default_extension_appended() {
        let normalizer = QueryNormalizer::new(false, ".pdf");
        let queries = normalizer.normalize(&["report", "notes.txt"]).unwrap();
        assert_eq!(texts(&queries), vec!["report.pdf", "notes.txt"]);
        assert!(!queries[0].has_explicit_extension);
        assert!(queries[1].has_explicit_extension);
    }

    #[test]
    fn test_match_extension_leaves_names_alone() {
        let normalizer = QueryNormalizer::new(true, ".png");
        let queries = normalizer.normalize(&["photo"]).unwrap();
        assert_eq!(texts(&queries), vec!["photo"]);

        let normalizer = QueryNormalizer::new(false, ".png");
        let queries = normalizer.normalize(&["photo"]).unwrap();
        assert_eq!(texts(&queries), vec!["photo.png"]);
    }

    #[test]
    fn test_extension_without_dot() {
        let normalizer = QueryNormalizer::new(false, "png");
        let queries = normalizer.normalize(&["photo"]).unwrap();
        assert_eq!(texts(&queries), vec!["photo.png"]);
    }

    #[test]
    fn test_blanks_and_duplicates_dropped() {
        let normalizer = QueryNormalizer::new(false, ".pdf");
        let lines = ["  report ", "", "   ", "report.pdf", "notes.txt", "report", "\tnotes.txt"];
        let queries = normalizer.normalize(&lines).unwrap();
        assert_eq!(texts(&queries), vec!["report.pdf", "notes.txt"]);
    }

    #[test]
    fn test_no_queries() {
        let normalizer = QueryNormalizer::new(true, "");
        let result = normalizer.normalize(&["", "  ", "\t"]);
        assert!(matches!(result, Err(BatchError::NoQueries)));

        let empty: [&str; 0] = [];
        assert!(matches!(normalizer.normalize(&empty), Err(BatchError::NoQueries)));
    }

    #[test]
    fn test_read_input_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.txt");
        fs::write(&path, "\u{feff}first.txt\r\nsecond\n\nthird.doc\n").unwrap();

        let lines = read_input_file(&path).unwrap();
        let normalizer = QueryNormalizer::new(true, "");
        let queries = normalizer.normalize(&lines).unwrap();
        assert_eq!(texts(&queries), vec!["first.txt", "second", "third.doc"]);
    }

    #[test]
    fn test_read_missing_input_file() {
        let result = read_input_file(Path::new("does-not-exist.txt"));
        assert!(matches!(result, Err(BatchError::IoError(_))));
    }
}
