//! SQLite pool for the reader database.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// One connection per concurrently upserted record, at the default batch
/// concurrency.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Concurrent upserts queue behind the single WAL writer.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The reader database. Migrated on connect; hand it to
/// [`Repository`](crate::Repository) for queries.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`, along with any
    /// missing parent directories.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(path, DEFAULT_MAX_CONNECTIONS).await
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display(), max_connections))]
    pub async fn connect_with(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool = Self::pool_options()
            .max_connections(max_connections.max(1))
            .connect_with(Self::common(options))
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::migrated(pool).await
    }

    /// Open an existing database without writing to it. No file is created
    /// and no migrations run. A missing file reads as an empty database,
    /// held in memory.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display(), max_connections))]
    pub async fn connect_read_only(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Database file does not exist, reading from an empty one");
            return Self::connect_in_memory().await;
        }
        let options = SqliteConnectOptions::new().filename(path).read_only(true).create_if_missing(false);
        let pool = Self::pool_options()
            .max_connections(max_connections.max(1))
            .connect_with(Self::common(options))
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Self { pool })
    }

    /// A private in-memory database, for tests in this and other crates.
    ///
    /// Every `:memory:` connection is a separate database, so the pool holds
    /// exactly one connection and never recycles it.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = Self::pool_options()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(Self::common(options))
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::migrated(pool).await
    }

    fn common(options: SqliteConnectOptions) -> SqliteConnectOptions {
        // Chapters and join rows cascade from their comic.
        options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT)
    }

    fn pool_options() -> SqlitePoolOptions {
        SqlitePoolOptions::new().after_connect(|conn, meta| Box::pin(async move { Self::tune(conn, meta).await }))
    }

    /// PRAGMAs without a builder method, run on every new connection.
    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query("PRAGMA temp_store = MEMORY; PRAGMA cache_size = -8192;").execute(conn).await?;
        Ok(())
    }

    async fn migrated(pool: SqlitePool) -> Result<Self> {
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[instrument("migrating database", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for outstanding queries, then close every connection.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn tables(db: &Database) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_is_migrated() {
        let db = Database::connect_in_memory().await.unwrap();
        let tables = tables(&db).await;
        for table in ["users", "comics", "chapters", "authors", "artists", "types", "genres"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(foreign_keys, 1);
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_connect_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/reader.db");
        let db = Database::connect_with(&path, 2).await.unwrap();
        assert!(path.exists());
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(mode, "wal");
        db.close().await;

        // Reopening runs no new migrations.
        let db = Database::connect(&path).await.unwrap();
        assert!(!tables(&db).await.is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_read_only_never_creates_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing/reader.db");
        let db = Database::connect_read_only(&path, 2).await.unwrap();
        assert!(!tables(&db).await.is_empty());
        db.close().await;
        assert!(!path.exists());
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reader.db");
        Database::connect(&path).await.unwrap().close().await;

        let db = Database::connect_read_only(&path, 1).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(db.pool()).await.unwrap();
        assert_eq!(count, 0);
        let insert = sqlx::query("INSERT INTO genres (name) VALUES ('Action')").execute(db.pool()).await;
        assert!(insert.is_err());
        db.close().await;
    }
}
