/// Name resolution against an external file-name index.
///
/// The index itself is never built here. A `SearchProvider` wraps whatever already
/// indexes the disk (the Everything service through its `es` client, or a plain
/// directory walk where Everything is unavailable), and the `SearchGateway` fans the
/// queries of a batch out over the worker pool:
///
/// ```rust,ignore
/// let provider = EsProvider::from_config(None)?;
/// let output = SearchGateway::new(&provider).search_all(&queries, &ctx);
/// for failure in &output.failures {
///     // one entry per query whose provider call failed
/// }
/// ```
pub mod gateway;
pub mod provider;

pub use gateway::{GatewayOutput, SearchGateway};
pub use provider::{EsProvider, SearchProvider, WalkProvider};
