// Integration tests for the connection pool
// Bounds, blocking acquire, timeouts, dead-connection replacement,
// commit control and shutdown

mod common;

use common::TestDb;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tessera_core::ExErrorKind;
use tessera_store::errors::from_rusqlite;
use tessera_store::{db, ConnectionManager, ConnectionPool, PoolConfig};

/// Switches shared by a test and the manager it hands to the pool
#[derive(Default)]
struct Switches {
    connects: AtomicUsize,
    invalid_checks: AtomicUsize,
    refuse_connect: AtomicBool,
}

/// Opens real connections but can be told to fail validity checks or connects
struct FlakyManager {
    url: String,
    switches: Arc<Switches>,
}

impl FlakyManager {
    fn new(url: &str) -> (Self, Arc<Switches>) {
        let switches = Arc::new(Switches::default());
        let manager = Self {
            url: url.to_string(),
            switches: Arc::clone(&switches),
        };
        (manager, switches)
    }
}

impl ConnectionManager for FlakyManager {
    fn connect(&self) -> tessera_store::Result<Connection> {
        if self.switches.refuse_connect.load(Ordering::SeqCst) {
            return Err(from_rusqlite(rusqlite::Error::InvalidQuery));
        }
        self.switches.connects.fetch_add(1, Ordering::SeqCst);
        db::open(&self.url)
    }

    fn is_valid(&self, conn: &Connection) -> bool {
        let pending = self.switches.invalid_checks.load(Ordering::SeqCst);
        if pending > 0 {
            self.switches.invalid_checks.store(pending - 1, Ordering::SeqCst);
            return false;
        }
        db::ping(conn)
    }
}

fn memory_config(size: usize) -> PoolConfig {
    PoolConfig::new(":memory:").with_max_connections(size)
}

#[test]
fn test_acquire_times_out_when_pool_is_exhausted() {
    // Given: A pool of two with a short acquire timeout
    let pool = ConnectionPool::new(
        memory_config(2).with_acquire_timeout(Some(Duration::from_millis(150))),
    )
    .unwrap();
    let _a = pool.acquire().unwrap();
    let _b = pool.acquire().unwrap();

    // When: A third caller asks for a connection
    let start = Instant::now();
    let err = pool.acquire().unwrap_err();

    // Then: It waited for the timeout and got PoolExhausted
    assert_eq!(err.kind(), ExErrorKind::PoolExhausted);
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(pool.checked_out(), 2);
}

#[test]
fn test_blocked_acquire_resumes_after_release() {
    // Given: A single-connection pool whose only connection is held
    let pool = ConnectionPool::new(memory_config(1).with_acquire_timeout(None)).unwrap();
    let held = pool.acquire().unwrap();

    // When: Another thread waits for it and the holder releases
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let conn = pool.acquire()?;
            Ok::<bool, tessera_core::ExError>(db::ping(&conn))
        })
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!waiter.is_finished());
    held.release();

    // Then: The waiter gets the connection
    assert!(waiter.join().unwrap().unwrap());
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn test_concurrent_checkouts_never_exceed_pool_size() {
    let pool = ConnectionPool::new(memory_config(3).with_acquire_timeout(None)).unwrap();
    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..20 {
                    let conn = pool.acquire().unwrap();
                    let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    assert!(db::ping(&conn));
                    in_use.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.idle_count(), 3);
    assert_eq!(pool.checked_out(), 0);
}

/// Poll `check` until it holds or `limit` passes; replacements open in the background
fn eventually(limit: Duration, check: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}

#[test]
fn test_dead_connection_is_replaced_on_checkout() {
    // Given: A pool whose manager will report the next checkout as dead
    let (manager, switches) = FlakyManager::new(":memory:");
    let pool = ConnectionPool::with_manager(memory_config(2), manager).unwrap();
    let opened = switches.connects.load(Ordering::SeqCst);
    assert_eq!(pool.idle_count(), 2);
    switches.invalid_checks.store(1, Ordering::SeqCst);

    // When: A caller acquires
    let conn = pool.acquire().unwrap();

    // Then: It got a live connection and the dead one is replaced
    assert!(db::ping(&conn));
    assert_eq!(switches.invalid_checks.load(Ordering::SeqCst), 0);
    assert!(eventually(Duration::from_secs(2), || {
        switches.connects.load(Ordering::SeqCst) == opened + 1
    }));
    drop(conn);
    assert!(eventually(Duration::from_secs(2), || pool.idle_count() == 2));
    assert_eq!(pool.checked_out(), 0);
}

#[test]
fn test_checkout_waits_for_database_to_accept_connections() {
    let (manager, switches) = FlakyManager::new(":memory:");
    let pool = ConnectionPool::with_manager(
        memory_config(1).with_acquire_timeout(Some(Duration::from_secs(5))),
        manager,
    )
    .unwrap();

    // Given: The only connection is dead and the database refuses new ones
    switches.invalid_checks.store(1, Ordering::SeqCst);
    switches.refuse_connect.store(true, Ordering::SeqCst);
    let reopen = {
        let switches = Arc::clone(&switches);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            switches.refuse_connect.store(false, Ordering::SeqCst);
        })
    };

    // When: A caller acquires while connects are still refused
    let conn = pool.acquire().unwrap();
    reopen.join().unwrap();

    // Then: The slot was reopened once the database came back
    assert!(db::ping(&conn));
    assert_eq!(pool.checked_out(), 1);
    drop(conn);
    assert_eq!(pool.checked_out(), 0);
}

#[test]
fn test_exhausted_pool_recovers_after_release() {
    let pool = ConnectionPool::new(
        memory_config(1).with_acquire_timeout(Some(Duration::from_millis(100))),
    )
    .unwrap();
    let held = pool.acquire().unwrap();
    assert_eq!(
        pool.acquire().unwrap_err().kind(),
        ExErrorKind::PoolExhausted
    );

    held.release();
    let conn = pool.acquire().unwrap();
    assert!(db::ping(&conn));
}

#[test]
fn test_initialization_failure_is_reported() {
    let (manager, switches) = FlakyManager::new(":memory:");
    switches.refuse_connect.store(true, Ordering::SeqCst);

    let err = ConnectionPool::with_manager(memory_config(2), manager).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::DataAccess);
}

#[test]
fn test_manual_mode_discards_uncommitted_work_on_release() {
    let db = TestDb::with_config(|c| c.with_auto_commit(false));

    // Given: A manual-commit connection that writes without committing
    {
        let conn = db.pool.acquire().unwrap();
        conn.execute("INSERT INTO tags (id, name) VALUES (1, 'draft')", [])
            .unwrap();
    }

    // Then: The write was rolled back when the connection went back
    let conn = db.pool.acquire().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_manual_mode_commit_persists() {
    let db = TestDb::with_config(|c| c.with_auto_commit(false));
    {
        let mut conn = db.pool.acquire().unwrap();
        conn.execute("INSERT INTO tags (id, name) VALUES (1, 'kept')", [])
            .unwrap();
        conn.commit().unwrap();
        // the next transaction is already open
        assert!(conn.in_transaction());
    }

    let conn = db.pool.acquire().unwrap();
    let name: String = conn
        .query_row("SELECT name FROM tags WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "kept");
}

#[test]
fn test_switching_auto_commit_on_commits_open_work() {
    let db = TestDb::new();
    {
        let mut conn = db.pool.acquire().unwrap();
        conn.set_auto_commit(false).unwrap();
        conn.execute("INSERT INTO tags (id, name) VALUES (9, 'flush')", [])
            .unwrap();
        conn.set_auto_commit(true).unwrap();
        assert!(!conn.in_transaction());
    }

    let conn = db.pool.acquire().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags WHERE id = 9", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_shutdown_is_idempotent_and_refuses_checkouts() {
    let pool = ConnectionPool::new(memory_config(2)).unwrap();
    let held = pool.acquire().unwrap();

    pool.shutdown();
    pool.shutdown();

    assert!(pool.is_shut_down());
    assert_eq!(pool.idle_count(), 0);
    let err = pool.acquire().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::PoolShutdown);

    // A connection released after shutdown is closed, not pooled
    held.release();
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.checked_out(), 0);
}

#[test]
fn test_shutdown_wakes_blocked_waiters() {
    let pool = ConnectionPool::new(memory_config(1).with_acquire_timeout(None)).unwrap();
    let _held = pool.acquire().unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire().map(|_| ()))
    };
    thread::sleep(Duration::from_millis(50));
    pool.shutdown();

    let err = waiter.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::PoolShutdown);
}
