//! Conversion between [`Value`] and the engine's value types.
//!
//! Text that is not valid UTF-8 is decoded lossily; the engine stores text
//! as UTF-8 for connections opened by this crate, so this only affects
//! databases written by foreign tools with another text encoding.

use rusqlite::types::{Value as SqlValue, ValueRef};
use scriptlite_core::Value;

/// Converts a borrowed engine value into an owned [`Value`].
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Converts a [`Value`] into the engine's owned value for binding.
pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}
