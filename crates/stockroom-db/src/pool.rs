//! # Database Pool Management
//!
//! Connection pool creation, configuration and write transactions for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── reads: repositories borrow any connection                    │
//! │       │                                                                 │
//! │       └── writes: begin_immediate() pins one connection and takes      │
//! │                   the database write lock before the first read        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Transactions
//! Every engine write runs as `BEGIN IMMEDIATE … COMMIT`. The write lock is
//! taken before the transaction reads anything, so two writers touching the
//! same catalog product never interleave: the second one waits (up to
//! `busy_timeout`) and then reads the first one's committed rows.
//!
//! ```text
//! let mut tx = db.begin_immediate().await?;
//! let result = work(&mut tx).await;
//! Database::finish(tx, result).await     // COMMIT on Ok, ROLLBACK on Err
//! ```
//!
//! A [`WriteTransaction`] dropped before `finish` (a cancelled task, an
//! elapsed `tokio::time::timeout`) rolls itself back before its connection
//! can be handed out again.
//!
//! ## WAL Mode
//! File databases run in WAL mode: readers never block the single writer.

use sqlx::pool::PoolConnection;
use sqlx::SqliteConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::receipt::ReceiptRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/stockroom.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// How long a writer waits for the database write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the write-lock wait.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The pool holds exactly one connection that never expires; a second
    /// connection would see a different, empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    /// True when this configuration points at an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared database handle.
///
/// Cloning is cheap (the pool is reference counted). The same handle is
/// passed into the pricing engine and the checkout processor; neither owns
/// the pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::in_memory()).await?;
/// let variant = db.variants().get("036000291452").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads (file databases)
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - busy timeout for writers waiting on the lock
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                // WAL mode: readers don't block the writer
                .journal_mode(SqliteJournalMode::Wal)
        };

        let connect_options = base_options
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        // Closing the only in-memory connection would drop the database
        pool_options = if config.is_in_memory() {
            pool_options.idle_timeout(None::<Duration>).max_lifetime(None::<Duration>)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For reads not covered by repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the variant (inventory) repository.
    pub fn variants(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    /// Returns the receipt repository.
    pub fn receipts(&self) -> ReceiptRepository {
        ReceiptRepository::new(self.pool.clone())
    }

    /// Returns the catalog repository.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    // =========================================================================
    // Write Transactions
    // =========================================================================

    /// Acquires a connection and opens a `BEGIN IMMEDIATE` transaction on it.
    ///
    /// ## Errors
    /// - `PoolExhausted` when no connection frees up within the acquire timeout
    /// - `TransactionFailed` when the write lock cannot be taken within the
    ///   busy timeout
    ///
    /// The caller hands the transaction back through [`Database::finish`].
    pub async fn begin_immediate(&self) -> DbResult<WriteTransaction> {
        let conn = self.pool.acquire().await?;

        // Guard first: if this future is dropped while BEGIN is still queued
        // on the connection, the guard's ROLLBACK is queued behind it.
        let mut tx = WriteTransaction { conn: Some(conn) };
        if let Err(e) = sqlx::query("BEGIN IMMEDIATE").execute(&mut *tx).await {
            tx.release();
            return Err(DbError::TransactionFailed(format!("begin: {e}")));
        }

        debug!("Write transaction opened");
        Ok(tx)
    }

    /// Commits when `result` is `Ok`, rolls back otherwise.
    ///
    /// A failed COMMIT is rolled back and reported as `TransactionFailed`;
    /// the original error of a failed body is returned unchanged.
    pub async fn finish<T>(mut tx: WriteTransaction, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => match sqlx::query("COMMIT").execute(&mut *tx).await {
                Ok(_) => {
                    tx.release();
                    debug!("Write transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    warn!(error = %e, "Commit failed, rolling back");
                    tx.rollback().await;
                    Err(DbError::TransactionFailed(format!("commit: {e}")))
                }
            },
            Err(err) => {
                tx.rollback().await;
                debug!(error = %err, "Write transaction rolled back");
                Err(err)
            }
        }
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Write Transaction Guard
// =============================================================================

/// A pooled connection inside `BEGIN IMMEDIATE`.
///
/// Derefs to the connection, so engine steps take `&mut tx` wherever they
/// expect a `&mut SqliteConnection`.
///
/// ```text
/// begin_immediate() ──► WriteTransaction ──┬── finish(Ok)  → COMMIT   ─┐
///                                          ├── finish(Err) → ROLLBACK ─┼─► back to pool
///                                          └── dropped     → ROLLBACK ─┘   (spawned)
/// ```
///
/// When a ROLLBACK itself fails the connection is detached from the pool and
/// closed, which releases the SQLite write lock.
pub struct WriteTransaction {
    // None once the transaction is finished or handed to the drop task
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    /// Returns the connection to the pool as is.
    fn release(&mut self) {
        self.conn.take();
    }

    async fn rollback(&mut self) {
        if let Some(conn) = self.conn.take() {
            rollback_or_close(conn).await;
        }
    }
}

async fn rollback_or_close(mut conn: PoolConnection<Sqlite>) {
    let result = sqlx::query("ROLLBACK").execute(&mut *conn).await;
    match result {
        Ok(_) => {}
        // SQLite already rolled back on its own
        Err(e) if e.to_string().contains("no transaction is active") => {}
        Err(e) => {
            warn!(error = %e, "Rollback failed, closing connection");
            drop(conn.detach());
        }
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match &self.conn {
            Some(conn) => &**conn,
            None => unreachable!("write transaction used after it finished"),
        }
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match &mut self.conn {
            Some(conn) => &mut **conn,
            None => unreachable!("write transaction used after it finished"),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        warn!("Write transaction dropped before finish, rolling back");
        match tokio::runtime::Handle::try_current() {
            // The pool only gets the connection back once the task is done.
            Ok(handle) => {
                handle.spawn(rollback_or_close(conn));
            }
            Err(_) => drop(conn.detach()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
