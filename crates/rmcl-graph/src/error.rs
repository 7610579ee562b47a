use rmcl_api::ApiError;
use rmcl_zip::ZipError;
use thiserror::Error;

/// Errors surfaced by the item graph and content pipeline.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Attempted to mutate a virtual item (root, trash, or the mode file).
    #[error("cannot mutate a virtual item")]
    VirtualItem,

    /// No item with the requested id exists in the graph.
    #[error("item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Zip(#[from] ZipError),

    #[error("cache error: {0}")]
    Cache(#[from] rmcl_cache::CacheError),
}
