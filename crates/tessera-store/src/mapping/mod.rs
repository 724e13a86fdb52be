//! Entity mapping
//!
//! - `naming`: field → column names and identifier checks
//! - `value`: column value conversions
//! - `entity`: the `Entity` descriptor and row mapping
//! - `bindings`: table bindings for the domain records

pub mod bindings;
pub mod entity;
pub mod naming;
pub mod value;

pub use entity::{id_text, map_row, Entity, FieldValues, ID_FIELD};
pub use naming::{is_valid_identifier, to_column_name};
pub use rusqlite::types::Value;
pub use value::{describe, ColumnValue, ConversionError, FromColumn, ToColumn, TIMESTAMP_FORMAT};
