//! Fixed-size blocking connection pool over [`r2d2`]
//!
//! The pool opens `max_connections` connections up front and hands them out
//! as [`PooledConnection`] guards. Dropping (or [`PooledConnection::release`])
//! a guard returns its connection to the pool. Every checkout runs the
//! manager's validity check first; r2d2 discards a connection that fails it
//! and opens a replacement in the background.
//!
//! Per-connection lifecycle:
//!
//! ```text
//! in-pool --acquire--> checked-out --release--> in-pool
//! in-pool --shutdown--> terminated
//! checked-out --release after shutdown--> terminated
//! ```
//!
//! Shutdown takes the `r2d2::Pool` out of the `ConnectionPool`. Idle
//! connections close once the last outstanding guard is returned.

use crate::config::PoolConfig;
use crate::db;
use crate::errors::{
    config_error, data_access, invalid_input, pool_exhausted, pool_interrupted, pool_shut_down,
    Result,
};
use r2d2::{HandleError, ManageConnection};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::{log_op_end, log_op_error, log_op_start};

/// How long a waiter sleeps inside r2d2 before rechecking for shutdown
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// How long `initialize` waits for the pool to fill when acquire waits forever
const FILL_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens and validates physical connections for a pool
pub trait ConnectionManager: Send + Sync + 'static {
    fn connect(&self) -> Result<Connection>;

    /// Called on every checkout; a `false` result makes the pool replace the
    /// connection before handing it out.
    fn is_valid(&self, conn: &Connection) -> bool {
        db::ping(conn)
    }
}

/// Opens connections with [`db::open`] for the configured URL
#[derive(Debug, Clone)]
pub struct SqliteConnectionManager {
    url: String,
}

impl SqliteConnectionManager {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            url: config.url().to_string(),
        }
    }
}

impl ConnectionManager for SqliteConnectionManager {
    fn connect(&self) -> Result<Connection> {
        db::open(&self.url)
    }
}

/// Lets r2d2 drive a [`ConnectionManager`]
struct ManagerAdapter {
    manager: Arc<dyn ConnectionManager>,
}

impl ManageConnection for ManagerAdapter {
    type Connection = Connection;
    type Error = ExError;

    fn connect(&self) -> Result<Connection> {
        self.manager.connect()
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<()> {
        if self.manager.is_valid(conn) {
            return Ok(());
        }
        Err(ExError::new(ExErrorKind::DataAccess)
            .with_op("validate_connection")
            .with_message("pooled connection failed its validity check"))
    }

    /// A connection still inside a transaction could not be rolled back
    fn has_broken(&self, conn: &mut Connection) -> bool {
        !conn.is_autocommit()
    }
}

/// Routes r2d2's background connect failures into tracing
#[derive(Debug)]
struct TracingErrorHandler;

impl HandleError<ExError> for TracingErrorHandler {
    fn handle_error(&self, error: ExError) {
        tracing::warn!(
            err_code = error.code(),
            err_message = error.message(),
            "pooled connection could not be opened"
        );
    }
}

type SqlitePool = r2d2::Pool<ManagerAdapter>;

/// Bounded pool of SQLite connections, safe to share across threads
pub struct ConnectionPool {
    config: PoolConfig,
    manager: Arc<dyn ConnectionManager>,
    pool: RwLock<Option<SqlitePool>>,
    shut_down: AtomicBool,
    checked_out: AtomicUsize,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("idle", &self.idle_count())
            .field("checked_out", &self.checked_out())
            .finish()
    }
}

impl ConnectionPool {
    /// Build and eagerly fill a pool for `config`
    pub fn new(config: PoolConfig) -> Result<Arc<Self>> {
        let manager = SqliteConnectionManager::new(&config);
        Self::with_manager(config, manager)
    }

    pub fn with_manager<M: ConnectionManager>(config: PoolConfig, manager: M) -> Result<Arc<Self>> {
        let pool = Arc::new(Self {
            config,
            manager: Arc::new(manager),
            pool: RwLock::new(None),
            shut_down: AtomicBool::new(false),
            checked_out: AtomicUsize::new(0),
        });
        pool.initialize()?;
        Ok(pool)
    }

    /// Open every connection; a no-op once the pool has been filled
    ///
    /// Fails with `PoolShutdown` after [`ConnectionPool::shutdown`].
    pub fn initialize(&self) -> Result<()> {
        let mut slot = self.pool.write().map_err(|_| pool_interrupted())?;
        if self.is_shut_down() {
            return Err(pool_shut_down());
        }
        if slot.is_some() {
            return Ok(());
        }

        let size = self.config.max_connections();
        log_op_start!(
            "pool_initialize",
            pool_size = size,
            url = self.config.url(),
            user = ?self.config.username()
        );
        let start = Instant::now();

        match self.build_pool(size) {
            Ok(pool) => {
                *slot = Some(pool);
                log_op_end!(
                    "pool_initialize",
                    duration_ms = start.elapsed().as_millis() as u64,
                    pool_size = size
                );
                Ok(())
            }
            Err(e) => {
                log_op_error!(
                    "pool_initialize",
                    &e,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                Err(e)
            }
        }
    }

    fn build_pool(&self, size: usize) -> Result<SqlitePool> {
        let max_size = u32::try_from(size)
            .map_err(|_| config_error(format!("max_connections {} is too large", size)))?;

        // r2d2 keeps retrying a failing connect until its timeout runs out;
        // one direct attempt reports a bad URL straight away.
        self.manager.connect()?;

        let fill_timeout = self
            .config
            .acquire_timeout()
            .unwrap_or(FILL_TIMEOUT)
            .max(Duration::from_millis(1));

        r2d2::Pool::builder()
            .max_size(max_size)
            .min_idle(Some(max_size))
            .connection_timeout(fill_timeout)
            .test_on_check_out(true)
            .idle_timeout(None)
            .max_lifetime(None)
            .error_handler(Box::new(TracingErrorHandler))
            .build(ManagerAdapter {
                manager: Arc::clone(&self.manager),
            })
            .map_err(|e| {
                ExError::new(ExErrorKind::DataAccess)
                    .with_op("pool_initialize")
                    .with_message(e.to_string())
            })
    }

    /// Check out a connection, blocking while the pool is empty
    ///
    /// Waits at most the configured acquire timeout. A connection that fails
    /// the manager's validity check is replaced transparently.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let timeout = self.config.acquire_timeout();
        let deadline = timeout.map(|t| Instant::now() + t);

        let conn = loop {
            let pool = self.live_pool()?;
            let wait = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(WAIT_SLICE),
                None => WAIT_SLICE,
            };
            match pool.get_timeout(wait) {
                Ok(conn) => break conn,
                Err(e) => {
                    if let (Some(timeout), Some(deadline)) = (timeout, deadline) {
                        if Instant::now() >= deadline {
                            tracing::debug!(error = %e, "acquire timed out");
                            return Err(pool_exhausted(timeout, self.config.max_connections()));
                        }
                    }
                }
            }
        };

        self.checked_out.fetch_add(1, Ordering::SeqCst);
        let mut pooled = PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            auto_commit: true,
        };
        if !self.config.auto_commit() {
            pooled.set_auto_commit(false)?;
        }
        Ok(pooled)
    }

    fn live_pool(&self) -> Result<SqlitePool> {
        self.pool
            .read()
            .map_err(|_| pool_interrupted())?
            .clone()
            .ok_or_else(pool_shut_down)
    }

    /// Refuse further checkouts and let the idle connections close
    ///
    /// Connections still checked out are closed when their guards drop.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        let retired = {
            let mut slot = self.pool.write().unwrap_or_else(|p| p.into_inner());
            self.shut_down.store(true, Ordering::SeqCst);
            slot.take()
        };
        let Some(pool) = retired else {
            return;
        };

        let idle = pool.state().idle_connections;
        log_op_start!("pool_shutdown", idle = idle);
        let start = Instant::now();
        drop(pool);
        log_op_end!(
            "pool_shutdown",
            duration_ms = start.elapsed().as_millis() as u64
        );
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn max_connections(&self) -> usize {
        self.config.max_connections()
    }

    /// Connections currently sitting in the pool
    pub fn idle_count(&self) -> usize {
        self.pool
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(|p| p.state().idle_connections as usize))
            .unwrap_or_default()
    }

    /// Connections currently held by callers
    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// A checked-out connection
///
/// Derefs to [`rusqlite::Connection`]. Dropping it returns the connection to
/// its pool; an open manual transaction is rolled back first, and a
/// connection whose rollback fails is discarded rather than pooled.
pub struct PooledConnection {
    conn: Option<r2d2::PooledConnection<ManagerAdapter>>,
    pool: Arc<ConnectionPool>,
    auto_commit: bool,
}

impl PooledConnection {
    /// Return the connection to the pool
    pub fn release(self) {
        drop(self);
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Switch between auto-commit and manual transaction mode
    ///
    /// Turning auto-commit off opens a transaction; turning it back on commits
    /// whatever is open.
    pub fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        if auto_commit {
            if self.in_transaction() {
                self.run("set_auto_commit", "COMMIT")?;
            }
        } else {
            self.run("set_auto_commit", "BEGIN")?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    /// Commit the open transaction and start the next one
    pub fn commit(&mut self) -> Result<()> {
        self.require_manual("commit")?;
        if self.in_transaction() {
            self.run("commit", "COMMIT")?;
        }
        self.run("commit", "BEGIN")
    }

    /// Roll back the open transaction and start the next one
    pub fn rollback(&mut self) -> Result<()> {
        self.require_manual("rollback")?;
        if self.in_transaction() {
            self.run("rollback", "ROLLBACK")?;
        }
        self.run("rollback", "BEGIN")
    }

    pub fn in_transaction(&self) -> bool {
        !self.connection().is_autocommit()
    }

    fn require_manual(&self, op: &str) -> Result<()> {
        if self.auto_commit {
            return Err(invalid_input(op, "connection is in auto-commit mode"));
        }
        Ok(())
    }

    fn run(&self, op: &str, sql: &str) -> Result<()> {
        self.connection()
            .execute_batch(sql)
            .map_err(|e| data_access(op, sql, e))
    }

    fn connection(&self) -> &Connection {
        self.conn
            .as_deref()
            .expect("pooled connection is present until drop")
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_deref_mut()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if !conn.is_autocommit() {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %e, "rolling back abandoned transaction failed");
                }
            }
            drop(conn);
            self.pool.checked_out.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("auto_commit", &self.auto_commit)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_pool(size: usize) -> Arc<ConnectionPool> {
        ConnectionPool::new(PoolConfig::new(":memory:").with_max_connections(size)).unwrap()
    }

    #[test]
    fn test_eager_initialization_fills_pool() {
        let pool = memory_pool(3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.checked_out(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let pool = memory_pool(2);
        pool.initialize().unwrap();
        pool.initialize().unwrap();
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_release_returns_connection() {
        let pool = memory_pool(1);
        let conn = pool.acquire().unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.checked_out(), 1);
        conn.release();
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.checked_out(), 0);
    }

    #[test]
    fn test_commit_requires_manual_mode() {
        let pool = memory_pool(1);
        let mut conn = pool.acquire().unwrap();
        assert!(conn.auto_commit());
        let err = conn.commit().unwrap_err();
        assert_eq!(err.kind(), tessera_core::ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_manual_mode_default_opens_transaction() {
        let pool = ConnectionPool::new(
            PoolConfig::new(":memory:")
                .with_max_connections(1)
                .with_auto_commit(false),
        )
        .unwrap();
        let conn = pool.acquire().unwrap();
        assert!(!conn.auto_commit());
        assert!(conn.in_transaction());
    }
}
