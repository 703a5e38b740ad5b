//! Dynamic SQL values exchanged with the driver.
//!
//! Parameters are always bound as [`Value`]s and rows come back as [`Value`]s;
//! [`ToValue`] and [`FromValue`] convert between them and Rust types.

use crate::error::{DbError, DbResult};
use serde::Serialize;
use std::fmt::Write as _;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Whether this is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is `NULL` or an integer zero.
    ///
    /// Used to decide whether an auto-increment column was left for the
    /// database to fill.
    pub fn is_unset_key(&self) -> bool {
        matches!(self, Value::Null | Value::Int(0) | Value::UInt(0))
    }

    /// Render as a MySQL literal.
    ///
    /// Only meant for human-readable debug output, never for executable SQL.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for ch in s.chars() {
                    match ch {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\u{1a}' => out.push_str("\\Z"),
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        c => out.push(c),
                    }
                }
                out.push('\'');
                out
            }
            Value::Bytes(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2 + 3);
                out.push_str("X'");
                for b in bytes {
                    let _ = write!(out, "{b:02X}");
                }
                out.push('\'');
                out
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "unsigned int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }
}

/// Convert a Rust value into a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Convert a [`Value`] into a Rust value.
///
/// `column` is only used for error messages.
pub trait FromValue: Sized {
    fn from_value(column: &str, value: &Value) -> DbResult<Self>;
}

fn mismatch(column: &str, expected: &str, value: &Value) -> DbError {
    DbError::decode(
        column,
        format!("expected {expected}, got {}", value.kind()),
    )
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(_column: &str, value: &Value) -> DbResult<Self> {
        Ok(value.clone())
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(column, other).map(Some),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::UInt(n) => Ok(*n != 0),
            Value::Text(s) if s == "0" || s == "1" => Ok(s == "1"),
            other => Err(mismatch(column, "bool", other)),
        }
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> Value {
                Value::Int(i64::from(*self))
            }
        }

        impl FromValue for $t {
            fn from_value(column: &str, value: &Value) -> DbResult<Self> {
                let out_of_range =
                    || DbError::decode(column, concat!("value out of range for ", stringify!($t)));
                match value {
                    Value::Int(n) => <$t>::try_from(*n).map_err(|_| out_of_range()),
                    Value::UInt(n) => <$t>::try_from(*n).map_err(|_| out_of_range()),
                    Value::Bool(b) => Ok(<$t>::from(*b)),
                    Value::Text(s) => s
                        .trim()
                        .parse::<$t>()
                        .map_err(|e| DbError::decode(column, e.to_string())),
                    other => Err(mismatch(column, stringify!($t), other)),
                }
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> Value {
                Value::UInt(u64::from(*self))
            }
        }

        impl FromValue for $t {
            fn from_value(column: &str, value: &Value) -> DbResult<Self> {
                let out_of_range =
                    || DbError::decode(column, concat!("value out of range for ", stringify!($t)));
                match value {
                    Value::Int(n) => <$t>::try_from(*n).map_err(|_| out_of_range()),
                    Value::UInt(n) => <$t>::try_from(*n).map_err(|_| out_of_range()),
                    Value::Bool(b) => Ok(<$t>::from(*b)),
                    Value::Text(s) => s
                        .trim()
                        .parse::<$t>()
                        .map_err(|e| DbError::decode(column, e.to_string())),
                    other => Err(mismatch(column, stringify!($t), other)),
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64);

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            Value::UInt(n) => Ok(*n as f64),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| DbError::decode(column, e.to_string())),
            other => Err(mismatch(column, "f64", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        f64::from_value(column, value).map(|f| f as f32)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(n) => Ok(n.to_string()),
            Value::UInt(n) => Ok(n.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| DbError::decode(column, e.to_string())),
            other => Err(mismatch(column, "text", other)),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => Err(mismatch(column, "bytes", other)),
        }
    }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

impl ToValue for chrono::NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Text(self.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
    }
}

impl FromValue for chrono::NaiveDateTime {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Text(s) => chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map_err(|e| DbError::decode(column, e.to_string())),
            other => Err(mismatch(column, "datetime text", other)),
        }
    }
}

impl ToValue for chrono::NaiveDate {
    fn to_value(&self) -> Value {
        Value::Text(self.format(DATE_FORMAT).to_string())
    }
}

impl FromValue for chrono::NaiveDate {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Text(s) => chrono::NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map_err(|e| DbError::decode(column, e.to_string())),
            other => Err(mismatch(column, "date text", other)),
        }
    }
}

impl ToValue for uuid::Uuid {
    fn to_value(&self) -> Value {
        Value::Text(self.hyphenated().to_string())
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Text(s) => {
                uuid::Uuid::parse_str(s).map_err(|e| DbError::decode(column, e.to_string()))
            }
            Value::Bytes(b) => {
                uuid::Uuid::from_slice(b).map_err(|e| DbError::decode(column, e.to_string()))
            }
            other => Err(mismatch(column, "uuid", other)),
        }
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(column: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Text(s) => {
                serde_json::from_str(s).map_err(|e| DbError::decode(column, e.to_string()))
            }
            Value::Bytes(b) => {
                serde_json::from_slice(b).map_err(|e| DbError::decode(column, e.to_string()))
            }
            Value::Null => Ok(serde_json::Value::Null),
            other => Err(mismatch(column, "json text", other)),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                v.to_value()
            }
        }
    )*};
}

impl_from_for_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Vec<u8>,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
    uuid::Uuid,
    serde_json::Value
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: ToValue> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.to_value()
    }
}
