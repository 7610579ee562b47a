use sqlx::Row;

use crate::error::CacheError;
use crate::pool::DatabasePool;

/// Persistent KV cache keyed by `(id, version, property)`.
///
/// Append-only within a version: a property is never invalidated by this
/// layer, only superseded — once an item's version changes, entries for
/// the old version are simply never looked up again.
pub struct DataCache {
    pool: DatabasePool,
}

impl DataCache {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Fetches a cached property value, if present.
    pub async fn get_property(
        &self,
        id: &str,
        version: i64,
        property: &str,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let row = sqlx::query(
            "SELECT value FROM filedata WHERE id = ? AND version = ? AND property = ?",
        )
        .bind(id)
        .bind(version)
        .bind(property)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(row.map(|r| r.get::<Vec<u8>, _>("value")))
    }

    /// Persists a property value, overwriting any prior value for the same
    /// compound key (a version bump produces a new key, so this never
    /// actually touches an older, still-stored generation).
    pub async fn set_property(
        &self,
        id: &str,
        version: i64,
        property: &str,
        value: &[u8],
    ) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT OR REPLACE INTO filedata (id, version, property, value) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(version)
        .bind(property)
        .bind(value)
        .execute(self.pool.pool())
        .await?;

        tracing::trace!(id, version, property, "cached data property");
        Ok(())
    }
}
