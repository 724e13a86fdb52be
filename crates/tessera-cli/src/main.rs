//! Tessera CLI
//!
//! Maintenance commands for a Tessera database: schema migration, demo data
//! and row counts.

use clap::{Parser, Subcommand};
use tessera_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera - learning platform database maintenance", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: commands::DbArgs,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Load the demo data set (existing rows are kept)
    Seed,
    /// Delete every row from every table
    Clear(commands::clear::ClearArgs),
    /// Show applied migrations and row counts
    Stats(commands::stats::StatsArgs),
}

fn main() {
    // a missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init(if cli.json_logs {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Migrate => commands::migrate::execute(&cli.db),
        Commands::Seed => commands::seed::execute(&cli.db),
        Commands::Clear(args) => commands::clear::execute(&cli.db, args),
        Commands::Stats(args) => commands::stats::execute(&cli.db, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
