use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::{Action, BatchConfig};
use crate::context::BatchContext;
use crate::errors::{BatchError, BatchResult};
use crate::executor::ActionExecutor;
use crate::filters::ResultFilter;
use crate::plan::ActionPlanner;
use crate::query::QueryNormalizer;
use crate::report::{NullSink, ProgressEvent, ReportSink};
use crate::results::{BatchReport, BatchStatus, BatchSummary, Query};
use crate::runlog::RunLog;
use crate::safety::{Confirm, FixedAnswer, GateDecision, SafetyGate};
use crate::search::{SearchGateway, SearchProvider};

static NO_REPORTS: NullSink = NullSink;
static NOT_CONFIRMED: FixedAnswer = FixedAnswer(false);

/// Runs Normalizer → Gateway → Filter → Planner → Gate → Executor for one batch.
///
/// Destructive actions are declined unless a `Confirm` implementation says otherwise.
pub struct BatchRunner<'a> {
    config: &'a BatchConfig,
    provider: &'a dyn SearchProvider,
    sink: &'a dyn ReportSink,
    confirm: &'a dyn Confirm,
    cancel: CancelToken,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a BatchConfig, provider: &'a dyn SearchProvider) -> Self {
        Self {
            config,
            provider,
            sink: &NO_REPORTS,
            confirm: &NOT_CONFIRMED,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn ReportSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_confirmation(mut self, confirm: &'a dyn Confirm) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the batch over raw input lines.
    ///
    /// Returns `Err` only for run-wide preconditions (no queries, bad filter pattern,
    /// unusable configuration). Everything else, including "nothing found" and a declined
    /// confirmation, comes back as a `BatchReport` with full counts.
    pub fn run<S: AsRef<str>>(&self, lines: &[S]) -> BatchResult<BatchReport> {
        let prepared = self.config.validate().and_then(|_| {
            let queries = QueryNormalizer::new(
                self.config.match_extension,
                &self.config.default_extension,
            )
            .normalize(lines)?;
            let filter = ResultFilter::new(self.config.regex_pattern.as_deref())?;
            Ok((queries, filter))
        });

        let (queries, filter) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.log_abort(&e);
                return Err(e);
            }
        };

        let mut report = self.execute(queries, &filter)?;
        self.sink.report(ProgressEvent::Finished {
            summary: report.summary.clone(),
        });

        if let Some(dir) = &self.config.log_path {
            match RunLog::create(dir).and_then(|log| log.write_report(&report)) {
                Ok(path) => report.log_file = Some(path),
                Err(e) => warn!("Could not write run log to {}: {}", dir.display(), e),
            }
        }

        info!(
            "Batch finished ({:?}): {} found, {} succeeded, {} failed",
            report.status,
            report.summary.total_found,
            report.summary.success_processed,
            report.summary.failed_operations
        );
        Ok(report)
    }

    fn execute(&self, queries: Vec<Query>, filter: &ResultFilter) -> BatchResult<BatchReport> {
        let ctx = BatchContext::new(self.config.thread_count, self.sink, self.cancel.clone())?;
        ctx.report(ProgressEvent::Starting {
            queries: queries.len(),
        });

        let gateway = SearchGateway::new(self.provider).search_all(&queries, &ctx);
        if gateway.is_exhausted() && !gateway.failures.is_empty() {
            warn!("{} queries failed and none returned a path", gateway.failures.len());
        }
        let raw_match_count = gateway.raw_matches.len();
        let matches = filter.apply(gateway.raw_matches);
        ctx.report(ProgressEvent::Found {
            total_found: matches.len(),
        });

        let mut summary = BatchSummary {
            queries_processed: ctx.metrics.get_stats().queries_completed,
            total_found: matches.len(),
            ..BatchSummary::default()
        };
        summary.record_search_failures(gateway.failures.len());

        let mut report = BatchReport {
            status: BatchStatus::Completed,
            action: self.config.action,
            queries,
            query_failures: gateway.failures,
            raw_match_count,
            matches,
            results: Vec::new(),
            summary,
            log_file: None,
        };

        if ctx.cancel.is_cancelled() {
            report.status = BatchStatus::Cancelled;
            return Ok(report);
        }
        if report.matches.is_empty() {
            info!("No matches, nothing to do");
            report.status = BatchStatus::NoMatches;
            return Ok(report);
        }
        if self.config.action == Action::None {
            return Ok(report);
        }

        let plans = ActionPlanner::new(
            self.config.action,
            self.config.destination_root.clone(),
            self.config.preserve_structure,
        )
        .plan(&report.matches)?;

        let gate = SafetyGate::new(&self.config.protected_paths);
        debug!("Checking plans against {} protected prefixes", gate.protected_prefixes().len());
        let (runnable, rejected) = match gate.check(plans, self.confirm) {
            GateDecision::Declined => {
                report.status = BatchStatus::Cancelled;
                return Ok(report);
            }
            GateDecision::Cleared { runnable, rejected } => (runnable, rejected),
        };

        if let Some(root) = &self.config.destination_root {
            if !runnable.is_empty() && !gate.is_protected(root) {
                if let Err(e) = fs::create_dir_all(root) {
                    warn!("Could not create {}: {}", root.display(), e);
                }
            }
        }

        let mut results = ActionExecutor::new().execute(runnable, &ctx);
        results.extend(rejected);

        // back into match order
        let position: HashMap<&Path, usize> = report
            .matches
            .iter()
            .enumerate()
            .map(|(i, m)| (m.path.as_path(), i))
            .collect();
        results.sort_by_key(|r| {
            position
                .get(r.plan.source.path.as_path())
                .copied()
                .unwrap_or(usize::MAX)
        });

        if ctx.cancel.is_cancelled() {
            report.status = BatchStatus::Cancelled;
        }
        report.summary.record_results(&results);
        report.results = results;
        Ok(report)
    }

    fn log_abort(&self, error: &BatchError) {
        let Some(dir) = &self.config.log_path else {
            return;
        };
        if let Err(e) = RunLog::create(dir).and_then(|log| log.write_abort(&error.to_string(), 0)) {
            warn!("Could not write run log to {}: {}", dir.display(), e);
        }
    }
}
