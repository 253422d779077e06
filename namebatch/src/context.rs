use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;

use crate::cancel::CancelToken;
use crate::errors::{BatchError, BatchResult};
use crate::metrics::BatchMetrics;
use crate::report::{ProgressEvent, ReportSink};

/// State threaded through every phase of one run
pub struct BatchContext<'a> {
    pub metrics: BatchMetrics,
    pub cancel: CancelToken,
    sink: &'a dyn ReportSink,
    pool: ThreadPool,
}

impl<'a> BatchContext<'a> {
    /// Builds a context with a dedicated worker pool of `threads` threads
    pub fn new(
        threads: NonZeroUsize,
        sink: &'a dyn ReportSink,
        cancel: CancelToken,
    ) -> BatchResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.get())
            .thread_name(|i| format!("namebatch-worker-{}", i))
            .build()
            .map_err(|e| BatchError::config_error(format!("failed to start worker pool: {}", e)))?;

        Ok(Self {
            metrics: BatchMetrics::new(),
            cancel,
            sink,
            pool,
        })
    }

    pub fn report(&self, event: ProgressEvent) {
        self.sink.report(event);
    }

    /// Runs `op` inside this run's worker pool
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }
}
