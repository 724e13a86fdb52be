//! Conversions between Rust field types and SQLite values
//!
//! `ToColumn` turns a field into a bound parameter, `FromColumn` reads it
//! back. Timestamps are stored as UTC text with a fixed nine-digit fraction
//! so that text ordering matches time ordering.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use tessera_core::errors::ModelError;
use tessera_core::{CourseStatus, Role};
use thiserror::Error;
use uuid::Uuid;

/// Storage format for timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Accepted on read; `%.f` also matches a missing fraction
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unexpected NULL")]
    UnexpectedNull,

    #[error("integer {value} does not fit in {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("invalid UUID '{value}': {reason}")]
    InvalidUuid { value: String, reason: String },

    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// SQLite storage class name, for messages
pub fn storage_class(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Integer(_) => "INTEGER",
        Value::Real(_) => "REAL",
        Value::Text(_) => "TEXT",
        Value::Blob(_) => "BLOB",
    }
}

/// Render a bound value for error context and dedup keys
pub fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => hex::encode(b),
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ConversionError {
    match found {
        Value::Null => ConversionError::UnexpectedNull,
        other => ConversionError::TypeMismatch {
            expected,
            found: storage_class(other),
        },
    }
}

pub trait ToColumn {
    fn to_column(&self) -> Value;

    /// True for values that mean "no id assigned yet"
    fn is_unset(&self) -> bool {
        false
    }
}

pub trait FromColumn: Sized {
    fn from_column(value: Value) -> Result<Self, ConversionError>;
}

/// A type that round-trips through a column
pub trait ColumnValue: ToColumn + FromColumn {}

impl<T: ToColumn + FromColumn> ColumnValue for T {}

impl<T: ToColumn + ?Sized> ToColumn for &T {
    fn to_column(&self) -> Value {
        (**self).to_column()
    }

    fn is_unset(&self) -> bool {
        (**self).is_unset()
    }
}

impl ToColumn for Value {
    fn to_column(&self) -> Value {
        self.clone()
    }

    fn is_unset(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl FromColumn for Value {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl ToColumn for str {
    fn to_column(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl ToColumn for String {
    fn to_column(&self) -> Value {
        Value::Text(self.clone())
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl FromColumn for String {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl ToColumn for i64 {
    fn to_column(&self) -> Value {
        Value::Integer(*self)
    }
}

impl FromColumn for i64 {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(mismatch("INTEGER", &other)),
        }
    }
}

impl ToColumn for i32 {
    fn to_column(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

impl FromColumn for i32 {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        let wide = i64::from_column(value)?;
        i32::try_from(wide).map_err(|_| ConversionError::OutOfRange {
            value: wide,
            target: "i32",
        })
    }
}

impl ToColumn for f64 {
    fn to_column(&self) -> Value {
        Value::Real(*self)
    }
}

impl FromColumn for f64 {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(mismatch("REAL", &other)),
        }
    }
}

impl ToColumn for bool {
    fn to_column(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

impl FromColumn for bool {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => Err(mismatch("INTEGER", &other)),
        }
    }
}

impl ToColumn for Uuid {
    fn to_column(&self) -> Value {
        Value::Text(self.hyphenated().to_string())
    }

    fn is_unset(&self) -> bool {
        self.is_nil()
    }
}

impl FromColumn for Uuid {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Uuid::parse_str(&s).map_err(|e| ConversionError::InvalidUuid {
                reason: e.to_string(),
                value: s,
            }),
            Value::Blob(bytes) => {
                Uuid::from_slice(&bytes).map_err(|e| ConversionError::InvalidUuid {
                    value: hex::encode(&bytes),
                    reason: e.to_string(),
                })
            }
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl ToColumn for DateTime<Utc> {
    fn to_column(&self) -> Value {
        Value::Text(self.format(TIMESTAMP_FORMAT).to_string())
    }
}

impl FromColumn for DateTime<Utc> {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => parse_timestamp(&s)
                .ok_or(ConversionError::InvalidTimestamp { value: s }),
            Value::Integer(secs) => DateTime::from_timestamp(secs, 0).ok_or(
                ConversionError::InvalidTimestamp {
                    value: secs.to_string(),
                },
            ),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_PARSE_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl<T: ToColumn> ToColumn for Option<T> {
    fn to_column(&self) -> Value {
        match self {
            Some(inner) => inner.to_column(),
            None => Value::Null,
        }
    }

    fn is_unset(&self) -> bool {
        self.as_ref().map_or(true, ToColumn::is_unset)
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_column(other).map(Some),
        }
    }
}

/// Store an enum as its canonical name; read it back case-insensitively
///
/// The type needs `as_str()` and a `FromStr` with `Err = ModelError`.
#[macro_export]
macro_rules! enum_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::mapping::ToColumn for $ty {
                fn to_column(&self) -> $crate::mapping::Value {
                    $crate::mapping::Value::Text(self.as_str().to_string())
                }
            }

            impl $crate::mapping::FromColumn for $ty {
                fn from_column(
                    value: $crate::mapping::Value,
                ) -> ::std::result::Result<Self, $crate::mapping::ConversionError> {
                    let name = <String as $crate::mapping::FromColumn>::from_column(value)?;
                    name.parse::<$ty>().map_err($crate::mapping::ConversionError::from)
                }
            }
        )+
    };
}

enum_column!(Role, CourseStatus);
