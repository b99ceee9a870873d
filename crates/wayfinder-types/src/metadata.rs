//! Typed metadata attached to indexed embeddings.
//!
//! Metadata is a string-keyed map of scalar values. Values are validated on
//! insertion: keys must be non-empty and floats must be finite. Nested
//! arrays or objects are rejected when converting from JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a JSON value, rejecting arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(MetadataValue::Null),
            Value::Bool(b) => Ok(MetadataValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(MetadataValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(MetadataValue::Float(f))
                } else {
                    Err(ValidationError::InvalidMetadata(format!(
                        "unrepresentable number: {n}"
                    )))
                }
            }
            Value::String(s) => Ok(MetadataValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(ValidationError::InvalidMetadata(
                "nested arrays and objects are not allowed".to_string(),
            )),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            MetadataValue::Float(f) if !f.is_finite() => Err(ValidationError::InvalidMetadata(
                "float values must be finite".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Null => f.write_str("null"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Int(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Validated string-keyed map of scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, MetadataValue>",
    into = "BTreeMap<String, MetadataValue>"
)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, validating key and value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Result<(), ValidationError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ValidationError::InvalidMetadata(
                "keys must not be empty".to_string(),
            ));
        }
        let value = value.into();
        value.validate()?;
        self.0.insert(key, value);
        Ok(())
    }

    /// Builder-style insert.
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Result<Self, ValidationError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    /// Text value for `key`, if present and textual.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(MetadataValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Convert a JSON object, rejecting nested values.
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ValidationError> {
        let mut metadata = Metadata::new();
        for (key, value) in object {
            metadata.insert(key.clone(), MetadataValue::from_json(value)?)?;
        }
        Ok(metadata)
    }
}

impl TryFrom<BTreeMap<String, MetadataValue>> for Metadata {
    type Error = ValidationError;

    fn try_from(map: BTreeMap<String, MetadataValue>) -> Result<Self, Self::Error> {
        let mut metadata = Metadata::new();
        for (key, value) in map {
            metadata.insert(key, value)?;
        }
        Ok(metadata)
    }
}

impl From<Metadata> for BTreeMap<String, MetadataValue> {
    fn from(metadata: Metadata) -> Self {
        metadata.0
    }
}
