//! Connection pool management and the startup lifecycle.
//!
//! The pool is built by [`DbHandle::initialize`], which retries a fixed
//! number of times with a fixed delay until a liveness probe succeeds, then
//! brings the schema up to date. Until that has happened every accessor on
//! the handle fails with [`Error::NotInitialized`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use shelf_core::config::DatabaseConfig;
use shelf_core::{Error, Result};

use crate::{error, functions, migrations};

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Bounded, fixed-delay retry settings for the initial connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_attempts: config.connect_attempts,
            delay: config.connect_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DatabaseConfig::default())
    }
}

/// Build a pool for the configured database file.
///
/// Every new connection gets a busy timeout, foreign keys and WAL journal
/// mode. Building fails if no connection can be opened within the
/// configured connection timeout.
pub fn open_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let busy = Duration::from_millis(config.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
        conn.busy_timeout(busy)?;
        functions::register(conn)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;",
        )
    });

    Pool::builder()
        .max_size(config.max_connections.max(1))
        .connection_timeout(config.connection_timeout())
        .build(manager)
        .map_err(error::pool)
}

/// Initialize an in-memory database pool with the schema applied (useful
/// for tests and benches).
///
/// Each call creates a uniquely-named shared-cache in-memory database so
/// that parallel tests do not interfere with each other, while all
/// connections *within* a single pool still share state.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:photoshelf_mem_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| {
            functions::register(conn)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::prepare_schema(&conn)?;

    Ok(pool)
}

/// Convenience helper to get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get().map_err(error::pool)
}

/// Run a trivial query to prove the store answers.
pub fn ping(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(error::sqlite)?;
    Ok(())
}

/// Call `connect` until it yields a pool that answers [`ping`], sleeping
/// `policy.delay` between failed attempts.
///
/// After `policy.max_attempts` failures (at least one attempt is always
/// made) the last error is returned wrapped in [`Error::Connection`].
pub fn connect_with_retry<C, S>(mut connect: C, policy: &RetryPolicy, mut sleep: S) -> Result<DbPool>
where
    C: FnMut() -> Result<DbPool>,
    S: FnMut(Duration),
{
    let attempts = policy.max_attempts.max(1);
    let mut last = Error::NotInitialized;

    for attempt in 1..=attempts {
        match connect().and_then(|pool| ping(&pool).map(|()| pool)) {
            Ok(pool) => {
                tracing::info!(attempt, "Database connection established");
                return Ok(pool);
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Database connection attempt failed"
                );
                last = e;
            }
        }
        if attempt < attempts {
            sleep(policy.delay);
        }
    }

    Err(Error::Connection {
        attempts,
        source: Box::new(last),
    })
}

/// Shared, lazily-initialized handle to the pool.
///
/// Cloning is cheap; all clones observe the same pool once
/// [`initialize`](Self::initialize) succeeds.
#[derive(Clone, Default)]
pub struct DbHandle {
    pool: Arc<OnceLock<DbPool>>,
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl DbHandle {
    /// A handle with no pool yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle wrapping an already-prepared pool.
    pub fn from_pool(pool: DbPool) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(pool);
        Self {
            pool: Arc::new(cell),
        }
    }

    /// Connect to the configured database with bounded retry, then prepare
    /// the schema. Blocks the calling thread while waiting between attempts.
    pub fn initialize(&self, config: &DatabaseConfig) -> Result<()> {
        self.initialize_with(
            || open_pool(config),
            &RetryPolicy::from_config(config),
            std::thread::sleep,
        )
    }

    /// [`initialize`](Self::initialize) with an injectable connector and
    /// sleep function.
    pub fn initialize_with<C, S>(&self, connect: C, policy: &RetryPolicy, sleep: S) -> Result<()>
    where
        C: FnMut() -> Result<DbPool>,
        S: FnMut(Duration),
    {
        if self.is_ready() {
            return Err(Error::Internal("database pool already initialized".into()));
        }

        let pool = connect_with_retry(connect, policy, sleep)?;
        let conn = get_conn(&pool)?;
        migrations::prepare_schema(&conn)?;
        drop(conn);

        self.pool
            .set(pool)
            .map_err(|_| Error::Internal("database pool already initialized".into()))
    }

    /// The pool, or [`Error::NotInitialized`] before startup completed.
    pub fn pool(&self) -> Result<&DbPool> {
        self.pool.get().ok_or(Error::NotInitialized)
    }

    /// Check out a connection.
    pub fn conn(&self) -> Result<PooledConnection> {
        get_conn(self.pool()?)
    }

    pub fn is_ready(&self) -> bool {
        self.pool.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_init_memory_pool() {
        let pool = init_memory_pool().unwrap();
        assert_eq!(pool.max_size(), 4);
        ping(&pool).unwrap();
    }

    #[test]
    fn test_open_pool_sets_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("catalog.db"),
            ..DatabaseConfig::default()
        };
        let pool = open_pool(&config).unwrap();
        assert_eq!(pool.max_size(), 10);

        let conn = get_conn(&pool).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let slept = Cell::new(Duration::ZERO);
        let pool = connect_with_retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(Error::unavailable("connection refused"))
                } else {
                    init_memory_pool()
                }
            },
            &test_policy(),
            |d| slept.set(slept.get() + d),
        )
        .unwrap();

        ping(&pool).unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(slept.get(), Duration::from_millis(500));
    }

    #[test]
    fn retry_gives_up_with_last_error() {
        let calls = Cell::new(0);
        let sleeps = Cell::new(0);
        let result = connect_with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(Error::unavailable(format!("refused #{}", calls.get())))
            },
            &test_policy(),
            |_| sleeps.set(sleeps.get() + 1),
        );
        let Err(err) = result else {
            panic!("expected connection failure");
        };

        assert_eq!(calls.get(), 3);
        assert_eq!(sleeps.get(), 2);
        match err {
            Error::Connection { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("refused #3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
        };
        let _ = connect_with_retry(
            || {
                calls.set(calls.get() + 1);
                init_memory_pool()
            },
            &policy,
            |_| {},
        )
        .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn handle_not_initialized() {
        let handle = DbHandle::new();
        assert!(!handle.is_ready());
        assert!(matches!(handle.pool(), Err(Error::NotInitialized)));
        assert!(matches!(handle.conn(), Err(Error::NotInitialized)));
    }

    #[test]
    fn handle_initialize_prepares_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("catalog.db"),
            connect_attempts: 1,
            ..DatabaseConfig::default()
        };
        let handle = DbHandle::new();
        handle.initialize(&config).unwrap();
        assert!(handle.is_ready());

        let clone = handle.clone();
        let conn = clone.conn().unwrap();
        assert!(migrations::column_exists(&conn, "photos", "tags").unwrap());

        assert!(handle.initialize(&config).is_err());
    }

    #[test]
    fn handle_initialize_fails_for_unreachable_store() {
        let config = DatabaseConfig {
            path: "/nonexistent-dir/photoshelf/catalog.db".into(),
            connection_timeout_secs: 1,
            ..DatabaseConfig::default()
        };
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
        };
        let handle = DbHandle::new();
        let err = handle
            .initialize_with(|| open_pool(&config), &policy, |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::Connection { attempts: 2, .. }));
        assert!(!handle.is_ready());
    }
}
