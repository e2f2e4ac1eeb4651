pub mod live;
pub mod migrations;
pub mod models;
pub mod notify;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::state::DbPool;

pub use self::live::Subscription;
pub use self::migrations::{MigrationOutcome, MigrationStrategy};
pub use self::notify::{ChangeNotifier, Notification};
pub use self::schema::{Schema, Table};

/// Options fixed at open time.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Upper bound on pooled SQLite connections. `1` gives a strict
    /// single-connection store.
    pub pool_size: u32,
    pub migration: MigrationStrategy,
    pub schema: Schema,
    pub channel_capacity: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            pool_size: 4,
            migration: MigrationStrategy::default(),
            schema: Schema::current(),
            channel_capacity: notify::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub path: PathBuf,
    pub schema_version: u32,
    pub users: i64,
    pub posts: i64,
    pub comments: i64,
    pub items: i64,
}

/// Handle to the single on-disk store.
///
/// A process holds one `Database`; clones share one pool and one notifier.
/// That pool may keep up to `pool_size` SQLite connections to the same
/// file, so reads can overlap while SQLite still admits one writer at a
/// time. Set `pool_size = 1` to hold exactly one physical connection.
///
/// All access goes through [`Database::call`] / [`Database::write`], which
/// run on tokio's blocking pool so callers are never blocked.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    pool: RwLock<Option<DbPool>>,
    path: PathBuf,
    notifier: ChangeNotifier,
}

fn init_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )
}

pub fn create_pool(db_path: &Path, max_size: u32) -> StoreResult<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Open one connection up front so an unreadable file fails now rather
    // than after the pool's connection timeout.
    Connection::open(db_path)
        .and_then(|conn| init_connection(&conn))
        .map_err(|e| {
            StoreError::StoreUnavailable(format!("cannot open {}: {e}", db_path.display()))
        })?;

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| init_connection(conn));

    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(Duration::from_secs(30))
        .build(manager)?;

    Ok(pool)
}

impl Database {
    /// Open (creating if needed) the store at `path` and bring its schema
    /// to `options.schema.version`.
    pub async fn open(path: &Path, options: &DatabaseOptions) -> StoreResult<Self> {
        let path = path.to_path_buf();
        let pool_size = options.pool_size;

        let pool = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || create_pool(&path, pool_size)).await??
        };

        let outcome = {
            let pool = pool.clone();
            let schema = options.schema.clone();
            let strategy = options.migration;
            tokio::task::spawn_blocking(move || {
                let conn = pool.get()?;
                migrations::run_migrations(&conn, &schema, strategy)
            })
            .await??
        };

        info!(
            path = %path.display(),
            pool_size,
            ?outcome,
            "Database opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                pool: RwLock::new(Some(pool)),
                path,
                notifier: ChangeNotifier::new(options.channel_capacity),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .pool
            .read()
            .map(|pool| pool.is_none())
            .unwrap_or(true)
    }

    fn pool(&self) -> StoreResult<DbPool> {
        let guard = self
            .inner
            .pool
            .read()
            .map_err(|_| StoreError::StoreUnavailable("pool lock poisoned".into()))?;
        guard
            .clone()
            .ok_or_else(|| StoreError::StoreUnavailable("database is closed".into()))
    }

    /// Run a read (or any closure) against a pooled connection.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool()?;
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }

    /// Run a write against `table`, then tell its subscribers.
    ///
    /// The notification is sent from the blocking task itself, so a write
    /// that commits is announced even if the caller stopped waiting.
    pub async fn write<F, T>(&self, table: Table, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool()?;
        let notifier = self.inner.notifier.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let result = f(&conn)?;
            notifier.publish(table);
            Ok(result)
        })
        .await?
    }

    pub async fn stats(&self) -> StoreResult<StoreStats> {
        let path = self.inner.path.clone();
        self.call(move |conn| {
            let count = |table: Table| -> StoreResult<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
                    row.get(0)
                })?)
            };
            Ok(StoreStats {
                path,
                schema_version: migrations::schema_version(conn)?,
                users: count(Table::Users)?,
                posts: count(Table::Posts)?,
                comments: count(Table::Comments)?,
                items: count(Table::Items)?,
            })
        })
        .await
    }

    /// Release the pool and end every live subscription. Later calls fail
    /// with `StoreUnavailable`. Closing twice is a no-op.
    pub fn close(&self) {
        let pool = match self.inner.pool.write() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                warn!("Pool lock poisoned while closing");
                None
            }
        };

        if pool.is_some() {
            self.inner.notifier.close();
            info!(path = %self.inner.path.display(), "Database closed");
        } else {
            debug!("Database already closed");
        }
    }
}

/// Run `f` inside `BEGIN IMMEDIATE`, committing on success and rolling back
/// on any error.
pub(crate) fn with_immediate_transaction<T, F>(conn: &Connection, f: F) -> StoreResult<T>
where
    F: FnOnce(&Connection) -> StoreResult<T>,
{
    conn.execute_batch("BEGIN IMMEDIATE")?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}
