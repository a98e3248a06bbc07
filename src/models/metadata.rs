//! Scalar metadata accepted at the storage boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Delimiter used when a list is flattened into a string.
pub const LIST_DELIMITER: &str = ", ";

/// A metadata value the vector store can persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Sanitized metadata of one stored record.
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    /// Convert an arbitrary JSON value into a storable scalar.
    ///
    /// Lists are joined with [`LIST_DELIMITER`], maps are serialized to JSON
    /// text. The conversion is lossy and one-way.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => MetadataValue::Null,
            Value::Bool(b) => MetadataValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Int(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => MetadataValue::Str(s.clone()),
            Value::Array(items) => MetadataValue::Str(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(LIST_DELIMITER),
            ),
            Value::Object(_) => MetadataValue::Str(value.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Null => f.write_str("null"),
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Int(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

/// Sanitize a rich metadata map into storable scalars.
pub fn sanitize(metadata: &Map<String, Value>) -> Metadata {
    metadata
        .iter()
        .map(|(key, value)| (key.clone(), MetadataValue::from_json(value)))
        .collect()
}

/// Split a list previously flattened by [`sanitize`].
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
