//! Error handling for tessera-store
//!
//! Translates driver and pool failures into `ExError` at the point of
//! occurrence. Nothing here retries.

use std::time::Duration;
use tessera_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// A statement failed; carries the SQL text
pub fn data_access(op: &str, sql: &str, err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::DataAccess)
        .with_op(op)
        .with_sql(sql)
        .with_message(err.to_string())
}

/// A driver failure outside any particular statement (open, pragma, begin)
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::DataAccess)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Row ↔ entity conversion failed
pub fn mapping_error(table: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Mapping)
        .with_op("map_row")
        .with_table(table)
        .with_message(message)
}

/// An UPDATE matched no row
pub fn row_not_updated(table: &str, sql: &str, id: &str) -> ExError {
    ExError::new(ExErrorKind::DataAccess)
        .with_op("update")
        .with_table(table)
        .with_entity_id(id)
        .with_sql(sql)
        .with_message("no row matched the id")
}

/// A staged entity type has no repository
pub fn unregistered_repository(type_name: &str) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("resolve_repository")
        .with_message(format!("no repository registered for {}", type_name))
}

/// Rolling back a failed commit failed; the original failure becomes the source
pub fn rollback_failed(rollback_err: ExError, original: ExError) -> ExError {
    ExError::new(ExErrorKind::RollbackFailed)
        .with_op("rollback")
        .with_sql("ROLLBACK")
        .with_message(rollback_err.message().to_string())
        .with_source(original)
}

/// Caller-side misuse (unset id, bad identifier)
pub fn invalid_input(op: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op(op)
        .with_message(message)
}

/// A caller-supplied field name is not a plain column identifier
pub fn invalid_field(op: &str, field: &str) -> ExError {
    invalid_input(op, format!("'{}' is not a valid field name", field))
}

pub fn pool_exhausted(timeout: Duration, size: usize) -> ExError {
    ExError::new(ExErrorKind::PoolExhausted)
        .with_op("acquire")
        .with_message(format!(
            "no connection became available within {} ms (pool size {})",
            timeout.as_millis(),
            size
        ))
}

pub fn pool_shut_down() -> ExError {
    ExError::new(ExErrorKind::PoolShutdown)
        .with_op("acquire")
        .with_message("connection pool has been shut down")
}

/// The pool mutex was poisoned while waiting
pub fn pool_interrupted() -> ExError {
    ExError::new(ExErrorKind::Interrupted)
        .with_op("acquire")
        .with_message("wait for a pooled connection was interrupted")
}

pub fn config_error(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("load_config")
        .with_message(message)
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::DataAccess)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// An applied migration's script changed after it was recorded
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
