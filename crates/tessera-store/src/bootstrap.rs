//! Schema setup and demo data
//!
//! `initialize` brings a database up to the current schema. `seed` loads a
//! small demo data set (idempotent: rows that exist are left alone) and
//! `clear` empties every table, link tables first.

use crate::errors::{data_access, Result};
use crate::migrations::{apply_migrations, MigrationReport};
use crate::pool::ConnectionPool;
use rusqlite::Connection;
use std::sync::Arc;

const SEED_SQL: &str = include_str!("../sql/seed_demo.sql");
const CLEAR_SQL: &str = include_str!("../sql/clear.sql");

/// Tables in dependency order, parents first
pub const TABLES: [&str; 6] = [
    "users",
    "courses",
    "tags",
    "attachments",
    "course_members",
    "course_tags",
];

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts(pub Vec<(&'static str, u64)>);

impl TableCounts {
    pub fn get(&self, table: &str) -> Option<u64> {
        self.0.iter().find(|(t, _)| *t == table).map(|(_, n)| *n)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, n)| n).sum()
    }
}

/// Apply pending migrations on a pooled connection
pub fn initialize(pool: &Arc<ConnectionPool>) -> Result<MigrationReport> {
    let mut conn = pool.acquire()?;
    // migrations manage their own transactions
    conn.set_auto_commit(true)?;
    apply_migrations(&mut conn)
}

pub fn seed(conn: &Connection) -> Result<()> {
    run_script(conn, "seed", SEED_SQL)
}

pub fn clear(conn: &Connection) -> Result<()> {
    run_script(conn, "clear", CLEAR_SQL)
}

pub fn table_counts(conn: &Connection) -> Result<TableCounts> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| data_access("table_counts", &sql, e).with_table(table))?;
        counts.push((table, n.max(0) as u64));
    }
    Ok(TableCounts(counts))
}

/// Run a multi-statement script atomically
fn run_script(conn: &Connection, op: &str, script: &str) -> Result<()> {
    if conn.is_autocommit() {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| data_access(op, "BEGIN", e))?;
        tx.execute_batch(script)
            .map_err(|e| data_access(op, script, e))?;
        tx.commit().map_err(|e| data_access(op, "COMMIT", e))
    } else {
        conn.execute_batch(script)
            .map_err(|e| data_access(op, script, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let mut conn = crate::db::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_seed_is_idempotent() {
        let conn = migrated();
        seed(&conn).unwrap();
        let first = table_counts(&conn).unwrap();
        seed(&conn).unwrap();
        assert_eq!(table_counts(&conn).unwrap(), first);

        assert_eq!(first.get("users"), Some(5));
        assert_eq!(first.get("courses"), Some(2));
        assert_eq!(first.get("course_members"), Some(3));
    }

    #[test]
    fn test_clear_empties_every_table() {
        let conn = migrated();
        seed(&conn).unwrap();
        clear(&conn).unwrap();
        assert_eq!(table_counts(&conn).unwrap().total(), 0);
    }
}
