//! Tessera Store - SQLite persistence for the Tessera learning platform
//!
//! Provides:
//! - A bounded, blocking connection pool with per-connection commit control
//! - Entity mapping from declarative table bindings
//! - A generic repository plus per-entity specializations
//! - A persistence context (unit of work) with atomic commit
//! - Embedded, checksummed schema migrations and demo seed data

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod mapping;
pub mod migrations;
pub mod pool;
pub mod repo;
pub mod uow;

// Re-export key types
pub use config::PoolConfig;
pub use errors::Result;
pub use mapping::Entity;
pub use pool::{ConnectionManager, ConnectionPool, PooledConnection, SqliteConnectionManager};
pub use repo::{
    AttachmentRepository, CourseRepository, GenericRepository, Page, Repository, Sort,
    TagRepository, UserRepository,
};
pub use uow::{CommitSummary, ContextState, PersistenceContext, RepositoryRegistry};
