use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{StateStore, StorageError};

/// Storage location configuration for the SQLite database.
#[derive(Debug, Clone)]
pub enum SqlitePath {
    File(PathBuf),
    Memory,
}

impl SqlitePath {
    fn to_manager(&self) -> SqliteConnectionManager {
        match self {
            SqlitePath::File(path) => {
                SqliteConnectionManager::file(path).with_flags(Self::open_flags())
            }
            SqlitePath::Memory => SqliteConnectionManager::memory().with_flags(Self::open_flags()),
        }
    }

    fn open_flags() -> OpenFlags {
        OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX
    }

    fn as_path(&self) -> Option<&Path> {
        match self {
            SqlitePath::File(path) => Some(path.as_path()),
            SqlitePath::Memory => None,
        }
    }
}

/// Configuration required to bootstrap SQLite persistence.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: SqlitePath,
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    pub fn memory() -> Self {
        Self {
            path: SqlitePath::Memory,
            // Each pooled connection to `:memory:` opens its own database;
            // a single connection keeps the store coherent.
            pool_size: 1,
            busy_timeout: Duration::from_millis(250),
        }
    }

    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: SqlitePath::File(path.into()),
            pool_size: 4,
            busy_timeout: Duration::from_millis(250),
        }
    }
}

/// Durable key/value backend over a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: Pool<SqliteConnectionManager>,
    db_path: Option<PathBuf>,
}

impl SqliteStateStore {
    /// Bootstraps the connection pool and runs the schema migration.
    pub fn bootstrap(config: SqliteConfig) -> Result<Self> {
        let busy_timeout = config.busy_timeout;
        let manager = config
            .path
            .to_manager()
            .with_init(move |conn| Self::configure_connection(conn, busy_timeout));

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .context("failed to create SQLite connection pool")?;

        {
            let conn = pool
                .get()
                .context("failed to acquire SQLite bootstrap connection")?;
            Self::run_migrations(&conn)?;
        }

        Ok(Self {
            pool,
            db_path: config.path.as_path().map(Path::to_path_buf),
        })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|err| StorageError::Backend(format!("failed to obtain connection: {err}")))
    }

    fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        Ok(())
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS client_state (
                key TEXT PRIMARY KEY,
                blob TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            "#,
        )
        .context("failed to run client_state migration")?;
        Ok(())
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

impl StateStore for SqliteStateStore {
    fn put(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO client_state (key, blob, updated_at_ms)
             VALUES (?1, ?2, strftime('%s','now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                blob=excluded.blob,
                updated_at_ms=excluded.updated_at_ms",
            params![key, blob],
        )
        .map_err(|err| StorageError::Backend(format!("failed to write state blob: {err}")))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT blob FROM client_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| StorageError::Backend(format!("failed to read state blob: {err}")))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM client_state WHERE key = ?1", params![key])
            .map_err(|err| StorageError::Backend(format!("failed to delete state blob: {err}")))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM client_state", [])
            .map_err(|err| StorageError::Backend(format!("failed to clear state: {err}")))?;
        Ok(())
    }
}
