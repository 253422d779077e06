/// Error types for the batch pipeline.
///
/// Only pipeline-wide preconditions surface as `Err(BatchError)`: an empty query list,
/// a filter pattern that does not compile, or a configuration that cannot run. Failures
/// of a single query or a single file operation are values (`Outcome::Failed`) and never
/// travel up through `?`.
///
/// ```rust,ignore
/// match runner.run(&lines) {
///     Ok(report) => // Inspect report.status and report.summary,
///     Err(BatchError::NoQueries) => // Nothing to search for,
///     Err(BatchError::InvalidPattern(detail)) => // Fix the --regex argument,
///     Err(e) => // Configuration or I/O problem
/// }
/// ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that abort a whole batch run
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No queries to search for")]
    NoQueries,
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Search provider error: {0}")]
    Provider(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BatchError {
    pub fn invalid_pattern(detail: impl Into<String>) -> Self {
        Self::InvalidPattern(detail.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
pub(crate) fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BatchError::invalid_pattern("unclosed group");
        assert!(matches!(err, BatchError::InvalidPattern(_)));

        let err = BatchError::config_error("missing destination");
        assert!(matches!(err, BatchError::ConfigError(_)));

        let err = BatchError::provider("es exited with status 1");
        assert!(matches!(err, BatchError::Provider(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(BatchError::NoQueries.to_string(), "No queries to search for");

        let err = BatchError::invalid_pattern("regex parse error: unclosed group");
        assert_eq!(
            err.to_string(),
            "Invalid pattern: regex parse error: unclosed group"
        );

        let err = BatchError::config_error("copy requires a destination root");
        assert_eq!(
            err.to_string(),
            "Configuration error: copy requires a destination root"
        );
    }

    #[test]
    fn test_strip_unc_prefix() {
        let p = Path::new(r"\\?\C:\Users\me\file.txt");
        assert_eq!(strip_unc_prefix(p), PathBuf::from(r"C:\Users\me\file.txt"));

        let plain = Path::new("/home/me/file.txt");
        assert_eq!(strip_unc_prefix(plain), plain.to_path_buf());
    }
}
