//! Dynamic values carried by conditions, cursors and document data.

use crate::field_path::FieldPath;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub type MapValue = BTreeMap<String, Value>;

/// A document field value.
///
/// The untagged wire form tries the variants in declaration order, so the object-shaped
/// variants (timestamp, reference, pending server timestamp) only match objects carrying
/// exactly their keys; any other object is a map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Timestamp(Timestamp),
    Reference(DocumentReference),
    ServerTimestamp(PendingServerTimestamp),
    Map(MapValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentReference {
    #[serde(rename = "$ref")]
    pub path: String,
}

/// A server timestamp written locally but not yet resolved by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingServerTimestamp {
    #[serde(rename = "$serverTimestamp")]
    pub local_write_time: Timestamp,
    #[serde(rename = "$previous", default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<Value>>,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl Value {
    /// Rank of the value's type in the cross-type ordering.
    pub fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Double(_) => 2,
            Value::Timestamp(_) | Value::ServerTimestamp(_) => 3,
            Value::String(_) => 4,
            Value::Reference(_) => 5,
            Value::Array(_) => 6,
            Value::Map(_) => 7,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Total ordering across all values.
///
/// Integers and doubles compare numerically; NaN sorts before every other number and
/// equals itself. A pending server timestamp sorts after every resolved timestamp.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let by_type = a.type_order().cmp(&b.type_order());
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Integer(x), Value::Double(y)) => compare_doubles(*x as f64, *y),
        (Value::Double(x), Value::Integer(y)) => compare_doubles(*x, *y as f64),
        (Value::Double(x), Value::Double(y)) => compare_doubles(*x, *y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Timestamp(_), Value::ServerTimestamp(_)) => Ordering::Less,
        (Value::ServerTimestamp(_), Value::Timestamp(_)) => Ordering::Greater,
        (Value::ServerTimestamp(x), Value::ServerTimestamp(y)) => {
            x.local_write_time.cmp(&y.local_write_time)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Reference(x), Value::Reference(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => compare_sequences(x.iter(), y.iter()),
        (Value::Map(x), Value::Map(y)) => {
            for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

fn compare_sequences<'a>(
    mut a: impl Iterator<Item = &'a Value>,
    mut b: impl Iterator<Item = &'a Value>,
) -> Ordering {
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_doubles(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Equality under the value ordering, so `1 == 1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Looks up a nested field by walking map segments.
pub fn get_field<'a>(data: &'a MapValue, path: &FieldPath) -> Option<&'a Value> {
    let mut segments = path.segments().iter();
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        match current {
            Value::Map(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}
