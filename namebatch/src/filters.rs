use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use crate::errors::{BatchError, BatchResult};
use crate::results::{Match, RawMatch};

/// Optional regex over full paths plus deduplication by path.
///
/// The pattern is searched anywhere in the path (`Regex::is_match`), so it only anchors
/// when it says `^` or `$` itself.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pattern: Option<Regex>,
}

impl ResultFilter {
    /// Compiles `pattern` once; empty or missing patterns keep every path
    pub fn new(pattern: Option<&str>) -> BatchResult<Self> {
        let pattern = match pattern.filter(|p| !p.is_empty()) {
            Some(p) => Some(Regex::new(p).map_err(|e| BatchError::invalid_pattern(e.to_string()))?),
            None => None,
        };
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    fn keeps(&self, path: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(path))
    }

    /// Keeps the first occurrence of every path that passes the pattern, in input order
    pub fn apply(&self, raw_matches: Vec<RawMatch>) -> Vec<Match> {
        let before = raw_matches.len();
        let mut seen = HashSet::new();
        let matches: Vec<Match> = raw_matches
            .into_iter()
            .filter(|raw| self.keeps(&raw.path.to_string_lossy()))
            .filter(|raw| seen.insert(raw.path.clone()))
            .map(Match::from)
            .collect();

        debug!("Filter kept {} of {} raw matches", matches.len(), before);
        matches
    }
}
