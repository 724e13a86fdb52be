//! Demo data command
//!
//! Usage: tessera seed [--db <PATH>]
//!
//! Migrates first, so a fresh database can be seeded in one step.

use super::{with_pool, CommandResult, DbArgs};
use tessera_store::bootstrap;

pub fn execute(db: &DbArgs) -> CommandResult {
    let pool = db.open()?;
    bootstrap::initialize(&pool)?;

    let counts = with_pool(&pool, |conn| {
        bootstrap::seed(conn)?;
        bootstrap::table_counts(conn)
    })?;

    println!("✓ Seeded demo data ({} rows in total)", counts.total());
    Ok(())
}
