//! Schema migration command
//!
//! Usage: tessera migrate [--db <PATH>]

use super::{CommandResult, DbArgs};
use tessera_store::bootstrap;

pub fn execute(db: &DbArgs) -> CommandResult {
    let pool = db.open()?;
    let report = bootstrap::initialize(&pool);
    pool.shutdown();
    let report = report?;

    if report.applied.is_empty() {
        println!("Schema is up to date ({} migrations)", report.skipped);
    }
    for id in &report.applied {
        println!("✓ Applied {}", id);
    }
    Ok(())
}
