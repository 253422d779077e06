use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters shared by the gateway and executor workers.
///
/// Every recorder returns the post-increment completion count, so progress events
/// carry a consistent number no matter which worker finishes first.
#[derive(Debug, Clone)]
pub struct BatchMetrics {
    queries_completed: Arc<AtomicUsize>,
    search_failures: Arc<AtomicUsize>,
    raw_matches: Arc<AtomicUsize>,

    actions_completed: Arc<AtomicUsize>,
    actions_succeeded: Arc<AtomicUsize>,
    actions_failed: Arc<AtomicUsize>,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self {
            queries_completed: Arc::new(AtomicUsize::new(0)),
            search_failures: Arc::new(AtomicUsize::new(0)),
            raw_matches: Arc::new(AtomicUsize::new(0)),
            actions_completed: Arc::new(AtomicUsize::new(0)),
            actions_succeeded: Arc::new(AtomicUsize::new(0)),
            actions_failed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Records a finished provider call, returns the number of queries done so far
    pub fn record_query(&self, hits: usize, failed: bool) -> usize {
        self.raw_matches.fetch_add(hits, Ordering::Relaxed);
        if failed {
            self.search_failures.fetch_add(1, Ordering::Relaxed);
        }
        let done = self.queries_completed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Query finished with {} hits, {} queries done", hits, done);
        done
    }

    /// Records a finished file operation, returns the number of actions done so far
    pub fn record_action(&self, succeeded: bool) -> usize {
        if succeeded {
            self.actions_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.actions_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.actions_completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get_stats(&self) -> BatchStats {
        BatchStats {
            queries_completed: self.queries_completed.load(Ordering::Relaxed),
            search_failures: self.search_failures.load(Ordering::Relaxed),
            raw_matches: self.raw_matches.load(Ordering::Relaxed),
            actions_completed: self.actions_completed.load(Ordering::Relaxed),
            actions_succeeded: self.actions_succeeded.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Batch stats:\n\
             Queries completed/failed: {}/{}\n\
             Raw matches: {}\n\
             Actions completed (ok/failed): {} ({}/{})",
            stats.queries_completed,
            stats.search_failures,
            stats.raw_matches,
            stats.actions_completed,
            stats.actions_succeeded,
            stats.actions_failed
        );
    }
}

impl Default for BatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub queries_completed: usize,
    pub search_failures: usize,
    pub raw_matches: usize,
    pub actions_completed: usize,
    pub actions_succeeded: usize,
    pub actions_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_query_tracking() {
        let metrics = BatchMetrics::new();

        assert_eq!(metrics.record_query(3, false), 1);
        assert_eq!(metrics.record_query(0, true), 2);

        let stats = metrics.get_stats();
        assert_eq!(stats.queries_completed, 2);
        assert_eq!(stats.search_failures, 1);
        assert_eq!(stats.raw_matches, 3);
    }

    #[test]
    fn test_concurrent_action_tracking() {
        let metrics = BatchMetrics::new();

        let mut seen: Vec<usize> = (0..1000)
            .into_par_iter()
            .map(|i| metrics.record_action(i % 4 != 0))
            .collect();
        seen.sort_unstable();

        let stats = metrics.get_stats();
        assert_eq!(stats.actions_completed, 1000);
        assert_eq!(stats.actions_succeeded, 750);
        assert_eq!(stats.actions_failed, 250);
        // every completion count handed out exactly once
        assert_eq!(seen, (1..=1000).collect::<Vec<_>>());
    }
}
