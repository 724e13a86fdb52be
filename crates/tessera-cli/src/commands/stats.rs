//! Stats command
//!
//! Usage: tessera stats [--json] [--db <PATH>]

use super::{with_pool, CommandResult, DbArgs};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use tessera_store::bootstrap::{self, TableCounts};
use tessera_store::migrations::applied_migrations;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Print a JSON document instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    migrations: Vec<String>,
    /// Empty until the schema has been migrated
    tables: BTreeMap<&'static str, u64>,
    total_rows: u64,
}

impl StatsReport {
    fn new(migrations: Vec<String>, counts: Option<TableCounts>) -> Self {
        let counts = counts.unwrap_or_default();
        Self {
            total_rows: counts.total(),
            tables: counts.0.into_iter().collect(),
            migrations,
        }
    }
}

pub fn execute(db: &DbArgs, args: StatsArgs) -> CommandResult {
    let pool = db.open()?;
    let report = with_pool(&pool, |conn| {
        let migrations = applied_migrations(conn)?;
        let counts = if migrations.is_empty() {
            None
        } else {
            Some(bootstrap::table_counts(conn)?)
        };
        Ok(StatsReport::new(migrations, counts))
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.migrations.is_empty() {
        println!("Schema not initialized; run `tessera migrate`");
        return Ok(());
    }
    println!("Migrations: {}", report.migrations.join(", "));
    for (table, rows) in &report.tables {
        println!("  {:<16} {:>8}", table, rows);
    }
    println!("  {:<16} {:>8}", "total", report.total_rows);
    Ok(())
}
