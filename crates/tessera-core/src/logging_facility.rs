//! Structured logging facility for Tessera
//!
//! - Single initialization point via `init(profile)`
//! - Boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`) used by
//!   pool lifecycle, migrations and unit-of-work commits
//! - Test capture mode for asserting on emitted events
//!
//! Statement-level detail (SQL text, row counts) is emitted by the store with
//! plain `tracing::debug!` and is not part of the boundary vocabulary.
//!
//! ```rust
//! use tessera_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
