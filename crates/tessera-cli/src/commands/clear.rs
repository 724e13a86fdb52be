//! Clear command
//!
//! Usage: tessera clear --yes [--db <PATH>]

use super::{with_pool, CommandResult, DbArgs};
use clap::Args;
use tessera_store::bootstrap;

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Confirm deletion of every row
    #[arg(long)]
    pub yes: bool,
}

pub fn execute(db: &DbArgs, args: ClearArgs) -> CommandResult {
    if !args.yes {
        return Err("Refusing to delete data without --yes".into());
    }

    let pool = db.open()?;
    let removed = with_pool(&pool, |conn| {
        let before = bootstrap::table_counts(conn)?;
        bootstrap::clear(conn)?;
        Ok(before.total())
    })?;

    println!("✓ Cleared {} rows", removed);
    Ok(())
}
