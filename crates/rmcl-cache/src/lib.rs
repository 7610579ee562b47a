//! Local caching: a persistent per-(id, version, property) KV store backed
//! by SQLite, and a one-slot in-memory cache for the most recently fetched
//! document blob.

mod data_cache;
mod document_cache;
mod error;
mod pool;

pub use data_cache::DataCache;
pub use document_cache::DocumentCache;
pub use error::CacheError;
pub use pool::DatabasePool;
