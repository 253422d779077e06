use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::provider::SearchProvider;
use crate::context::BatchContext;
use crate::report::{Phase, ProgressEvent};
use crate::results::{Query, QueryFailure, RawMatch};

/// What happened to one query
#[derive(Debug)]
enum QueryState {
    Hits(Vec<PathBuf>),
    Failed(String),
    Skipped,
}

/// Aggregated provider answers for a list of queries
#[derive(Debug, Default)]
pub struct GatewayOutput {
    /// In query order, provider order within a query
    pub raw_matches: Vec<RawMatch>,
    pub failures: Vec<QueryFailure>,
    /// Queries never sent because the run was cancelled
    pub skipped: usize,
}

impl GatewayOutput {
    /// Every query failed or came back empty
    pub fn is_exhausted(&self) -> bool {
        self.raw_matches.is_empty()
    }
}

/// Sends one provider request per query and isolates failures per query
pub struct SearchGateway<'a> {
    provider: &'a dyn SearchProvider,
}

impl<'a> SearchGateway<'a> {
    pub fn new(provider: &'a dyn SearchProvider) -> Self {
        Self { provider }
    }

    pub fn search_all(&self, queries: &[Query], ctx: &BatchContext<'_>) -> GatewayOutput {
        info!(
            "Searching {} queries with the {} provider",
            queries.len(),
            self.provider.name()
        );
        let total = queries.len();

        let states: Vec<QueryState> = ctx.install(|| {
            queries
                .par_iter()
                .map(|query| {
                    if ctx.cancel.is_cancelled() {
                        return QueryState::Skipped;
                    }

                    let state = match self.provider.search(&query.text) {
                        Ok(paths) => QueryState::Hits(paths),
                        Err(e) => {
                            warn!("Search for '{}' failed: {}", query, e);
                            QueryState::Failed(e.to_string())
                        }
                    };

                    let (hits, failed) = match &state {
                        QueryState::Hits(paths) => (paths.len(), false),
                        _ => (0, true),
                    };
                    let completed = ctx.metrics.record_query(hits, failed);
                    ctx.report(ProgressEvent::Progress {
                        phase: Phase::Search,
                        completed,
                        total,
                        item: query.text.clone(),
                        failed,
                    });
                    state
                })
                .collect()
        });

        let mut output = GatewayOutput::default();
        for (query_index, (query, state)) in queries.iter().zip(states).enumerate() {
            match state {
                QueryState::Hits(paths) => {
                    debug!("'{}' matched {} paths", query, paths.len());
                    output.raw_matches.extend(
                        paths
                            .into_iter()
                            .map(|path| RawMatch { query_index, path }),
                    );
                }
                QueryState::Failed(reason) => output.failures.push(QueryFailure {
                    query: query.clone(),
                    reason,
                }),
                QueryState::Skipped => output.skipped += 1,
            }
        }

        info!(
            "Search complete. {} raw matches, {} failed queries, {} skipped",
            output.raw_matches.len(),
            output.failures.len(),
            output.skipped
        );
        output
    }
}
