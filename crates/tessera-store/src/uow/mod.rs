//! Unit of work
//!
//! [`PersistenceContext`] stages changes and commits them atomically through
//! the repositories held by a shared [`RepositoryRegistry`].

pub mod context;
pub mod registry;

pub use context::{CommitSummary, ContextState, PersistenceContext};
pub use registry::RepositoryRegistry;
