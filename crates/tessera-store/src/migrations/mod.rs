//! Schema migrations
//!
//! Scripts are embedded at compile time and recorded in `schema_version`
//! with a SHA-256 checksum. Re-running is a no-op; a recorded script whose
//! text has since changed is refused.

mod embedded;
mod runner;

pub use embedded::{get_migrations, Migration};
pub use runner::{applied_migrations, apply_migrations, compute_checksum, MigrationReport};
