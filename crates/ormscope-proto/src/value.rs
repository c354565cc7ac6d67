//! Runtime value types for filters and entity rows.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A runtime value used in filter literals and materialized rows.
///
/// Values are archived with rkyv by the reference store, and serialized
/// with serde when a plan is rendered as JSON.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64, widening 32-bit integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality with integer widening, as used when matching keys and filters.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                self.as_i64() == other.as_i64()
            }
            (Value::Float64(a), b) | (b, Value::Float64(a)) => b.as_f64() == Some(*a),
            _ => self == other,
        }
    }

    /// Ordering between comparable values. `None` for incompatible types.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                Some(self.as_i64()?.cmp(&other.as_i64()?))
            }
            (Value::Float64(_), _) | (_, Value::Float64(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            // Quotes are doubled the way SQL string literals escape them.
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(t) => write!(f, "@{}", t),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_value_conversions() {
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));

        let v: Value = "tony".into();
        assert_eq!(v, Value::String("tony".into()));

        let v: Value = None::<i32>.into();
        assert!(v.is_null());

        let v: Value = Some(5i64).into();
        assert_eq!(v, Value::Int64(5));
    }

    #[test]
    fn test_loose_equality_widens_integers() {
        assert!(Value::Int32(1).loose_eq(&Value::Int64(1)));
        assert!(Value::Int64(2).loose_eq(&Value::Float64(2.0)));
        assert!(!Value::Int32(1).loose_eq(&Value::String("1".into())));
        assert!(Value::Null.loose_eq(&Value::Null));
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::Int32(3).compare(&Value::Int64(5)), Some(Ordering::Less));
        assert_eq!(
            Value::String("b".into()).compare(&Value::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Bool(true).compare(&Value::Int32(1)), None);
    }

    #[test]
    fn test_display_escapes_quotes() {
        assert_eq!(Value::String("escape'd".into()).to_string(), "'escape''d'");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_value_archive_roundtrip() {
        let value = Value::String("hello world".into());
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&value).unwrap();
        let archived = rkyv::access::<ArchivedValue, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Value =
            rkyv::deserialize::<Value, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(value, deserialized);
    }
}
