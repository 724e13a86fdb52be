//! Subcommands and the database options they share

use clap::Args;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_store::{ConnectionPool, PoolConfig};

pub mod clear;
pub mod migrate;
pub mod seed;
pub mod stats;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Args)]
pub struct DbArgs {
    /// TOML file with a [database] table
    #[arg(long, global = true, conflicts_with = "db")]
    pub config: Option<PathBuf>,

    /// Database path or URL; overrides TESSERA_DATABASE_URL
    #[arg(long, global = true)]
    pub db: Option<String>,
}

impl DbArgs {
    /// `--config`, then `--db`, then `TESSERA_*` variables (`.env` included)
    pub fn resolve(&self) -> Result<PoolConfig, Box<dyn std::error::Error>> {
        let config = match (&self.config, &self.db) {
            (Some(path), _) => PoolConfig::from_toml_file(path)?,
            // one-shot commands never need more than a single connection
            (None, Some(url)) => PoolConfig::new(url.as_str()).with_max_connections(1),
            (None, None) => PoolConfig::from_env()?,
        };
        tracing::debug!(config = ?config, "resolved database configuration");
        Ok(config)
    }

    pub fn open(&self) -> Result<Arc<ConnectionPool>, Box<dyn std::error::Error>> {
        Ok(ConnectionPool::new(self.resolve()?)?)
    }
}

/// Run `f` on a pooled connection, committing when the pool hands out
/// manual-commit connections, then shut the pool down
pub fn with_pool<T>(
    pool: &Arc<ConnectionPool>,
    f: impl FnOnce(&Connection) -> tessera_store::Result<T>,
) -> Result<T, Box<dyn std::error::Error>> {
    let outcome = (|| {
        let mut conn = pool.acquire()?;
        let value = f(&*conn)?;
        if !conn.auto_commit() {
            conn.commit()?;
        }
        Ok::<T, tessera_core::ExError>(value)
    })();
    pool.shutdown();
    Ok(outcome?)
}
