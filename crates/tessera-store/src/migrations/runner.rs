//! Migration runner

use crate::errors::{checksum_mismatch, data_access, migration_error, Result};
use crate::migrations::embedded::{get_migrations, Migration};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::time::Instant;
use tessera_core::{log_op_end, log_op_error, log_op_start};

const CREATE_SCHEMA_VERSION_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL,
    checksum TEXT
)";

/// Outcome of one `apply_migrations` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Ids applied by this run, in order
    pub applied: Vec<&'static str>,
    /// Migrations that were already recorded
    pub skipped: usize,
}

/// SHA-256 of a script, hex-encoded
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Apply every pending migration, each in its own transaction
pub fn apply_migrations(conn: &mut Connection) -> Result<MigrationReport> {
    log_op_start!("apply_migrations");
    let start = Instant::now();

    let result = run_all(conn, &get_migrations());

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(report) => {
            log_op_end!(
                "apply_migrations",
                duration_ms = duration_ms,
                applied = report.applied.len(),
                skipped = report.skipped
            );
        }
        Err(e) => {
            log_op_error!("apply_migrations", e, duration_ms = duration_ms);
        }
    }
    result
}

/// Recorded migration ids, oldest first
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let sql = "SELECT migration_id FROM schema_version ORDER BY id";
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(true),
        )
        .optional()
        .map_err(|e| data_access("applied_migrations", "sqlite_master", e))?
        .unwrap_or(false);
    if !exists {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| data_access("applied_migrations", sql, e))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| data_access("applied_migrations", sql, e))?;
    let mut ids = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| data_access("applied_migrations", sql, e))?
    {
        ids.push(
            row.get(0)
                .map_err(|e| data_access("applied_migrations", sql, e))?,
        );
    }
    Ok(ids)
}

fn run_all(conn: &mut Connection, migrations: &[Migration]) -> Result<MigrationReport> {
    conn.execute(CREATE_SCHEMA_VERSION_SQL, [])
        .map_err(|e| data_access("apply_migrations", CREATE_SCHEMA_VERSION_SQL, e))?;

    let mut report = MigrationReport::default();
    for migration in migrations {
        if apply_migration(conn, migration.id, migration.sql)? {
            report.applied.push(migration.id);
        } else {
            report.skipped += 1;
        }
    }
    Ok(report)
}

/// Returns false when the migration was already recorded with a matching checksum
fn apply_migration(conn: &mut Connection, migration_id: &str, sql: &str) -> Result<bool> {
    let checksum = compute_checksum(sql);

    let recorded: Option<Option<String>> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?1",
            [migration_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| data_access("apply_migration", "SELECT checksum", e))?;

    match recorded {
        Some(Some(expected)) if expected != checksum => {
            return Err(checksum_mismatch(migration_id, &expected, &checksum));
        }
        // rows written without a checksum are trusted
        Some(_) => return Ok(false),
        None => {}
    }

    let tx = conn
        .transaction()
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;
    tx.execute_batch(sql)
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![migration_id, chrono::Utc::now().timestamp(), checksum],
    )
    .map_err(|e| migration_error(migration_id, &e.to_string()))?;
    tx.commit()
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;

    tracing::info!(migration_id, "migration applied");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::ExErrorKind;

    #[test]
    fn test_apply_migrations_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = apply_migrations(&mut conn).unwrap();
        assert_eq!(report.applied, vec!["001_initial_schema", "002_course_relations"]);

        for table in ["users", "courses", "tags", "attachments", "course_members", "course_tags"] {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_idempotency() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        let report = apply_migrations(&mut conn).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, 2);
        assert_eq!(
            applied_migrations(&conn).unwrap(),
            vec!["001_initial_schema", "002_course_relations"]
        );
    }

    #[test]
    fn test_changed_script_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "UPDATE schema_version SET checksum = 'deadbeef' WHERE migration_id = '001_initial_schema'",
            [],
        )
        .unwrap();

        let err = apply_migrations(&mut conn).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
        assert!(err.message().contains("001_initial_schema"));
    }

    #[test]
    fn test_broken_script_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(CREATE_SCHEMA_VERSION_SQL, []).unwrap();
        let err = apply_migration(&mut conn, "900_broken", "CREATE TABLE t (x); NOT SQL;")
            .unwrap_err();
        assert!(err.message().contains("900_broken"));

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 't'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
        assert!(applied_migrations(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_no_history_before_first_run() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(applied_migrations(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        let checksum = compute_checksum("SELECT 1");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum("SELECT 1"));
    }
}
