//! Opening and configuring SQLite connections

use crate::errors::{from_rusqlite, Result};
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection for a pool URL
///
/// Accepts a filesystem path, `:memory:`, or a `file:` URI (for example
/// `file:shared?mode=memory&cache=shared`).
pub fn open(url: &str) -> Result<Connection> {
    let conn = if url == ":memory:" {
        Connection::open_in_memory()
    } else if url.starts_with("file:") {
        Connection::open_with_flags(
            url,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    } else {
        Connection::open(url)
    }
    .map_err(from_rusqlite)?;

    configure(&conn)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    open(":memory:")
}

/// Apply per-connection settings
pub fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT).map_err(from_rusqlite)?;

    conn.pragma_update(None, "foreign_keys", true)
        .map_err(from_rusqlite)?;
    // journal_mode answers with the resulting mode; in-memory databases stay "memory"
    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?;

    Ok(())
}

/// Cheap liveness check
pub fn ping(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map(|one| one == 1)
        .unwrap_or(false)
}
