//! Property values and node handles.
//!
//! Graph properties in IYP are scalars: integers, floats, strings and UTC
//! timestamps. Property maps are ordered by key so that two maps built in a
//! different insertion order compare and serialize identically.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar property value.
///
/// # Examples
///
/// ```
/// use iyp::Value;
///
/// let asn = Value::from(65000);
/// let prefix = Value::from("2001:db8::/32");
///
/// assert_eq!(asn.as_int(), Some(65000));
/// assert_eq!(prefix.as_str(), Some("2001:db8::/32"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Returns the integer payload, if any.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// Property map of a node or relationship, ordered by key.
pub type Properties = BTreeMap<String, Value>;

/// Builds a [`Properties`] map from key/value pairs.
///
/// ```
/// use iyp::{properties, Value};
///
/// let props = properties([("asn", Value::from(2497)), ("name", Value::from("IIJ"))]);
/// assert_eq!(props.len(), 2);
/// ```
pub fn properties<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Properties
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Opaque node handle returned by the graph store.
///
/// Only ever compared for equality and passed back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    /// Wraps a raw store identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw store identifier.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Self::Int(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_order_independent() {
        let a = properties([("asn", Value::from(1)), ("name", Value::from("x"))]);
        let b = properties([("name", Value::from("x")), ("asn", Value::from(1))]);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from(7).to_string(), "7");
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_node_id_roundtrip_value() {
        let id = NodeId::new(42);
        assert_eq!(Value::from(id).as_int(), Some(42));
        assert_eq!(id.raw(), 42);
    }
}
