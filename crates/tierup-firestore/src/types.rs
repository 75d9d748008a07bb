//! Firestore REST API types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

impl Value {
    /// Inner map; `None` for any other kind.
    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::MapValue(map) => Some(map),
            _ => None,
        }
    }

    /// Short kind name, used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::NullValue(_) => "null",
            Value::BooleanValue(_) => "boolean",
            Value::IntegerValue(_) => "integer",
            Value::DoubleValue(_) => "double",
            Value::TimestampValue(_) => "timestamp",
            Value::StringValue(_) => "string",
            Value::BytesValue(_) => "bytes",
            Value::ReferenceValue(_) => "reference",
            Value::ArrayValue(_) => "array",
            Value::MapValue(_) => "map",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

impl MapValue {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.as_ref().map_or(true, |f| f.is_empty())
    }
}

/// Firestore document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Look up a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(name))
    }
}

/// Convert a Rust value to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for HashMap<String, T> {
    fn to_firestore_value(&self) -> Value {
        Value::MapValue(MapValue {
            fields: Some(
                self.iter()
                    .map(|(k, v)| (k.clone(), v.to_firestore_value()))
                    .collect(),
            ),
        })
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_value_wire_format() {
        let json = serde_json::to_value(42i64.to_firestore_value()).unwrap();
        assert_eq!(json, serde_json::json!({"integerValue": "42"}));
    }

    #[test]
    fn test_score_map_wire_format() {
        let mut scores = HashMap::new();
        scores.insert("web3".to_string(), -5i64);

        let json = serde_json::to_value(scores.to_firestore_value()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mapValue": {"fields": {"web3": {"integerValue": "-5"}}}})
        );
    }

    #[test]
    fn test_document_decodes_map_field() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "name": "projects/p/databases/(default)/documents/users/u1",
            "fields": {
                "xp": {"mapValue": {"fields": {"trader": {"integerValue": "100"}}}}
            },
            "updateTime": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        let xp = doc.field("xp").and_then(Value::as_map).unwrap();
        assert_eq!(xp.get("trader").and_then(i64::from_firestore_value), Some(100));
    }

    #[test]
    fn test_empty_map_value_has_no_fields() {
        let value: Value = serde_json::from_value(serde_json::json!({"mapValue": {}})).unwrap();
        assert!(value.as_map().unwrap().is_empty());
        assert_eq!(value.kind(), "map");
    }

    #[test]
    fn test_fractional_double_is_not_an_integer() {
        assert_eq!(i64::from_firestore_value(&Value::DoubleValue(2.0)), Some(2));
        assert_eq!(i64::from_firestore_value(&Value::DoubleValue(2.5)), None);
        assert_eq!(i64::from_firestore_value(&Value::StringValue("2".into())), None);
    }
}
