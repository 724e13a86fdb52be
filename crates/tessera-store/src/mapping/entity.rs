//! Entity descriptors and row mapping
//!
//! A persistable type declares its table and its ordered field list through
//! `impl_entity!`. The first declared field is always `id`. Column names are
//! derived from field names with [`to_column_name`], and rows are read back
//! by column name, so the SELECT list order does not matter.

use super::naming::to_column_name;
use super::value::{describe, ColumnValue, FromColumn, ToColumn};
use crate::errors::{mapping_error, Result};
use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::Debug;

/// The id field every entity declares first
pub const ID_FIELD: &str = "id";

/// A type the generic repository can persist
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: ColumnValue + Clone + Debug + Send + Sync + 'static;

    fn table_name() -> &'static str;

    /// Declared field names, `id` first
    fn field_names() -> &'static [&'static str];

    fn id(&self) -> &Self::Id;

    /// Field values in `field_names()` order
    fn values(&self) -> Vec<Value>;

    fn from_fields(fields: &mut FieldValues) -> Result<Self>;

    /// Column names in declaration order
    fn column_names() -> Vec<String> {
        Self::field_names()
            .iter()
            .map(|field| to_column_name(field))
            .collect()
    }
}

/// Raw column values of one row, keyed by field name
#[derive(Debug)]
pub struct FieldValues {
    table: &'static str,
    entries: Vec<(&'static str, Option<Value>)>,
}

impl FieldValues {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, field: &'static str, value: Value) {
        self.entries.push((field, Some(value)));
    }

    /// Move a field out and convert it
    pub fn take<T: FromColumn>(&mut self, field: &str) -> Result<T> {
        let table = self.table;
        let slot = self
            .entries
            .iter_mut()
            .find(|(name, _)| *name == field)
            .and_then(|(_, value)| value.take())
            .ok_or_else(|| {
                mapping_error(table, format!("field {} was not read from the row", field))
            })?;

        T::from_column(slot).map_err(|e| {
            mapping_error(
                table,
                format!("field {} (column {}): {}", field, to_column_name(field), e),
            )
        })
    }
}

/// Build an entity from a row that carries all of its columns
pub fn map_row<E: Entity>(row: &Row<'_>) -> Result<E> {
    let table = E::table_name();
    let mut fields = FieldValues::new(table);

    for field in E::field_names() {
        let column = to_column_name(field);
        let value: Value = row.get(column.as_str()).map_err(|e| {
            mapping_error(table, format!("column {}: {}", column, e))
        })?;
        fields.insert(field, value);
    }

    E::from_fields(&mut fields)
}

/// Printable id, for error context and dedup keys
pub fn id_text<E: Entity>(id: &E::Id) -> String {
    describe(&id.to_column())
}

/// Declare how a struct maps onto a table
///
/// ```ignore
/// impl_entity! {
///     User => "users" {
///         id: Uuid,
///         username: String,
///         created_at: DateTime<Utc> as "createdAt",
///     }
/// }
/// ```
///
/// A member may carry a field name (`as "createdAt"`); the column name is
/// derived from the field name, which defaults to the member name.
#[macro_export]
macro_rules! impl_entity {
    (@field $member:ident $field:literal) => { $field };
    (@field $member:ident) => { stringify!($member) };
    (
        $ty:ty => $table:literal {
            id: $id_ty:ty
            $(, $member:ident : $fty:ty $(as $field:literal)? )*
            $(,)?
        }
    ) => {
        impl $crate::mapping::Entity for $ty {
            type Id = $id_ty;

            fn table_name() -> &'static str {
                $table
            }

            fn field_names() -> &'static [&'static str] {
                &["id" $(, $crate::impl_entity!(@field $member $($field)?))*]
            }

            fn id(&self) -> &Self::Id {
                &self.id
            }

            fn values(&self) -> ::std::vec::Vec<$crate::mapping::Value> {
                ::std::vec![
                    $crate::mapping::ToColumn::to_column(&self.id)
                    $(, $crate::mapping::ToColumn::to_column(&self.$member))*
                ]
            }

            fn from_fields(
                fields: &mut $crate::mapping::FieldValues,
            ) -> $crate::errors::Result<Self> {
                Ok(Self {
                    id: fields.take::<$id_ty>("id")?,
                    $(
                        $member: fields.take::<$fty>(
                            $crate::impl_entity!(@field $member $($field)?)
                        )?,
                    )*
                })
            }
        }
    };
}
