//! Value types flowing through a batch run.
//!
//! Every type here lives for a single run: queries become raw matches, raw matches that
//! survive filtering become matches, matches become plans and every plan produces exactly
//! one result. Only the `BatchSummary` (and the run log) outlive the run.
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::Action;

/// A canonical name submitted to the search provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Query {
    /// The name exactly as it is sent to the provider
    pub text: String,
    /// Whether the user typed an extension themselves
    pub has_explicit_extension: bool,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One hit returned by the provider for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMatch {
    /// Index of the originating query in the normalized query list
    pub query_index: usize,
    pub path: PathBuf,
}

/// A raw match that survived filtering and deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub query_index: usize,
    pub path: PathBuf,
}

impl From<RawMatch> for Match {
    fn from(raw: RawMatch) -> Self {
        Self {
            query_index: raw.query_index,
            path: raw.path,
        }
    }
}

/// A concrete instruction for one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    pub source: Match,
    pub action: Action,
    /// `None` for delete
    pub destination: Option<PathBuf>,
}

/// How a single plan ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed(String),
    /// Never started because the run was cancelled first
    Cancelled,
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// The recorded result of one plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub plan: ActionPlan,
    pub outcome: Outcome,
}

/// A query whose provider call failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub query: Query,
    pub reason: String,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every phase ran to the end
    Completed,
    /// Nothing was found, no actions were attempted
    NoMatches,
    /// Confirmation was declined or the user stopped the run
    Cancelled,
}

/// Aggregate counters for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub queries_processed: usize,
    /// Matches after filtering and deduplication
    pub total_found: usize,
    pub success_processed: usize,
    /// Search failures plus action failures
    pub failed_operations: usize,
    pub search_failures: usize,
    pub action_failures: usize,
    /// Plans that were executed, successfully or not
    pub actions_taken: usize,
    /// Plans that never started because of cancellation
    pub skipped: usize,
}

impl BatchSummary {
    /// Folds action results into the action counters
    pub fn record_results(&mut self, results: &[ActionResult]) {
        for result in results {
            match &result.outcome {
                Outcome::Success => {
                    self.success_processed += 1;
                    self.actions_taken += 1;
                }
                Outcome::Failed(_) => {
                    self.action_failures += 1;
                    self.failed_operations += 1;
                    self.actions_taken += 1;
                }
                Outcome::Cancelled => self.skipped += 1,
            }
        }
    }

    pub fn record_search_failures(&mut self, count: usize) {
        self.search_failures += count;
        self.failed_operations += count;
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub action: Action,
    pub queries: Vec<Query>,
    pub query_failures: Vec<QueryFailure>,
    pub raw_match_count: usize,
    pub matches: Vec<Match>,
    pub results: Vec<ActionResult>,
    pub summary: BatchSummary,
    /// Run log written for this batch, if any
    pub log_file: Option<PathBuf>,
}

impl BatchReport {
    /// True when nothing failed and the run was not cancelled
    pub fn is_success(&self) -> bool {
        self.status != BatchStatus::Cancelled && self.summary.failed_operations == 0
    }
}
