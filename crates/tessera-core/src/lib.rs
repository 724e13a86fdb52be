//! Tessera Core - domain records, error facility and logging facility
//!
//! This crate is storage-agnostic. It provides:
//! - Domain records (`User`, `Course`, `Tag`, `Attachment`) with id-based identity
//! - The structured `ExError` facility shared by every Tessera crate
//! - The `tracing`-based logging facility and its boundary macros

pub mod errors;
pub mod logging_facility;
pub mod model;

pub use errors::{ExError, ExErrorKind, ModelError, Result};
pub use model::{Attachment, Course, CourseStatus, Role, Tag, User};
