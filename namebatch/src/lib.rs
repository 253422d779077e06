pub mod cancel;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod filters;
pub mod metrics;
pub mod pipeline;
pub mod plan;
pub mod query;
pub mod report;
pub mod results;
pub mod runlog;
pub mod safety;
pub mod search;

pub use cancel::CancelToken;
pub use config::{Action, BatchConfig, ProviderKind};
pub use errors::{BatchError, BatchResult};
pub use pipeline::BatchRunner;
pub use report::{ProgressEvent, ReportSink};
pub use results::{ActionResult, BatchReport, BatchStatus, BatchSummary, Outcome};
pub use safety::{Confirm, FixedAnswer};
pub use search::{EsProvider, SearchProvider, WalkProvider};

/// Builds the provider selected in `config`
pub fn provider_from_config(config: &BatchConfig) -> BatchResult<Box<dyn SearchProvider>> {
    Ok(match config.provider {
        ProviderKind::Everything => Box::new(EsProvider::from_config(config.es_path.as_deref())?),
        ProviderKind::Walk => Box::new(WalkProvider::new(config.search_roots.clone())),
    })
}
