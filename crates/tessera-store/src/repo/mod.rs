//! Repositories
//!
//! [`GenericRepository`] derives CRUD SQL from an entity's descriptor. The
//! [`Repository`] trait is the contract shared by the generic repository and
//! the per-entity specializations, which add their own finders and
//! relationship operations.

pub mod attachment_repo;
pub mod contract;
pub mod course_repo;
pub mod filter;
pub mod generic;
pub mod tag_repo;
pub mod user_repo;

pub use attachment_repo::{AttachmentRepository, StorageUsage};
pub use contract::{IdOf, Repository};
pub use course_repo::CourseRepository;
pub use filter::{Aggregation, AllOf, CountBy, Filter, Page, Sort, SumBy, WhereClause};
pub use generic::GenericRepository;
pub use tag_repo::TagRepository;
pub use user_repo::UserRepository;
