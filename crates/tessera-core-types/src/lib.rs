//! Types shared by the Tessera error and logging facilities
//!
//! - **Schema constants**: canonical field keys and event names
//! - **Sensitive data**: `Sensitive<T>` marker for credential redaction

pub mod schema;
pub mod sensitive;

pub use sensitive::Sensitive;
