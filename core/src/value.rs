//! Engine values and declared parameter types.
//!
//! [`Value`] mirrors the five storage classes of the embedded engine. The
//! engine's null marker is [`Value::Null`]; it is a value in its own right
//! and is never collapsed into "no entry" by any result shape.
//!
//! [`ParamType`] is the optional declared type of a typed
//! [`Parameter`](crate::Parameter). Declaring a type coerces the value once,
//! when the parameter is built or updated, so the engine always receives the
//! declared storage class.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// A single engine value.
///
/// # Examples
///
/// ```
/// use scriptlite_core::Value;
///
/// assert_eq!(Value::from(42), Value::Integer(42));
/// assert_eq!(Value::from("x"), Value::Text("x".into()));
/// assert_eq!(Value::from(None::<i64>), Value::Null);
/// assert_eq!(Value::from(true), Value::Integer(1));
/// assert_eq!(Value::Null.to_string(), "NULL");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The engine null marker.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the numeric payload of an integer or real.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the blob payload, if any.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Name of the storage class, as the engine spells it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(bytes) => {
                f.write_str("x'")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Errors raised while coercing a value to a declared [`ParamType`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// The value has no representation in the declared type.
    #[error("cannot convert {found} value '{value}' to {target}")]
    Conversion {
        /// Display form of the rejected value.
        value: String,
        /// Storage class of the rejected value.
        found: &'static str,
        /// Declared target type.
        target: ParamType,
    },
}

/// Declared type of a typed parameter.
///
/// # Examples
///
/// ```
/// use scriptlite_core::{ParamType, Value};
///
/// assert_eq!(ParamType::Integer.coerce(Value::from("42")).unwrap(), Value::Integer(42));
/// assert_eq!(ParamType::Text.coerce(Value::from(7)).unwrap(), Value::from("7"));
/// assert!(ParamType::Integer.coerce(Value::from("seven")).is_err());
/// assert_eq!(ParamType::Blob.coerce(Value::Null).unwrap(), Value::Null);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// No conversion; the value is bound as given.
    #[default]
    Any,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Integer `0` or `1`.
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamType::Any => "any",
            ParamType::Integer => "integer",
            ParamType::Real => "real",
            ParamType::Text => "text",
            ParamType::Blob => "blob",
            ParamType::Boolean => "boolean",
        })
    }
}

impl ParamType {
    /// Converts `value` to this type. `Null` passes through every type.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Conversion`] when the value has no
    /// representation in this type (e.g. non-numeric text as an integer).
    pub fn coerce(self, value: Value) -> Result<Value, ValueError> {
        if value.is_null() {
            return Ok(value);
        }
        let converted = match self {
            ParamType::Any => Some(value.clone()),
            ParamType::Integer => to_integer(&value),
            ParamType::Real => to_real(&value),
            ParamType::Text => to_text(&value),
            ParamType::Blob => to_blob(&value),
            ParamType::Boolean => to_boolean(&value),
        };
        converted.ok_or_else(|| ValueError::Conversion {
            value: value.to_string(),
            found: value.type_name(),
            target: self,
        })
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Integer(*i)),
        Value::Real(r) if r.fract() == 0.0 && *r >= i64::MIN as f64 && *r < i64::MAX as f64 => {
            Some(Value::Integer(*r as i64))
        }
        Value::Text(s) => s.trim().parse().ok().map(Value::Integer),
        _ => None,
    }
}

fn to_real(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Real(*i as f64)),
        Value::Real(r) => Some(Value::Real(*r)),
        Value::Text(s) => s.trim().parse().ok().map(Value::Real),
        _ => None,
    }
}

fn to_text(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(_) | Value::Real(_) => Some(Value::Text(value.to_string())),
        Value::Text(s) => Some(Value::Text(s.clone())),
        Value::Blob(b) => String::from_utf8(b.clone()).ok().map(Value::Text),
        Value::Null => None,
    }
}

fn to_blob(value: &Value) -> Option<Value> {
    match value {
        Value::Text(s) => Some(Value::Blob(s.as_bytes().to_vec())),
        Value::Blob(b) => Some(Value::Blob(b.clone())),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    let flag = match value {
        Value::Integer(i) => *i != 0,
        Value::Real(r) => *r != 0.0,
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(Value::from(flag))
}

/// Hashable key of a lookup result.
///
/// Wraps a [`Value`] with total equality: reals compare and hash by bit
/// pattern, so `NaN` keys are stable and `1` and `1.0` are different keys.
/// [`Value::Null`] is a legal key.
///
/// # Examples
///
/// ```
/// use scriptlite_core::{LookupKey, Value};
///
/// assert_eq!(LookupKey::from(1), LookupKey::from(Value::Integer(1)));
/// assert_ne!(LookupKey::from(1), LookupKey::from(1.0));
/// assert!(LookupKey::from(Value::Null).value().is_null());
/// ```
#[derive(Debug, Clone)]
pub struct LookupKey(Value);

impl LookupKey {
    /// Returns the wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consumes the key and returns the wrapped value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for LookupKey {
    fn from(v: Value) -> Self {
        LookupKey(v)
    }
}

macro_rules! lookup_key_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for LookupKey {
                fn from(v: $ty) -> Self {
                    LookupKey(Value::from(v))
                }
            }
        )*
    };
}

lookup_key_from!(i32, i64, f64, bool, String, &str, Vec<u8>);

impl PartialEq for LookupKey {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LookupKey {}

impl Hash for LookupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match &self.0 {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Real(r) => r.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Blob(b) => b.hash(state),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for LookupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
