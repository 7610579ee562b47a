use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::CacheError;

/// Owns the `sqlx` connection pool to the `filedata.db` SQLite file.
///
/// WAL journal mode, a short busy timeout so concurrent writers from the
/// same process serialize rather than erroring, and the bundled migration
/// run eagerly on open.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the cache database at `db_path`.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(include_str!("migrations/20260731_initial.sql"))
            .execute(&pool)
            .await?;

        tracing::info!(path = %db_path.display(), "opened data cache database");
        Ok(Self { pool })
    }

    /// An in-memory database for tests: a single connection, no file on
    /// disk, migrations still applied.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(include_str!("migrations/20260731_initial.sql"))
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
