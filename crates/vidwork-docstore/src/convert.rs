//! Generic `serde_json::Value` <-> Firestore [`Value`] conversion.
//!
//! The per-type [`ToFirestoreValue`]/[`FromFirestoreValue`] impls in
//! [`crate::types`] are exact for the hand-picked scalar fields the original
//! client dealt with. The status and checkpoint stores persist whole model
//! structs (`vidwork_models::Job`, `Checkpoint`) that already derive
//! `Serialize`/`Deserialize`, so round-tripping through `serde_json::Value`
//! first and converting that generically is less code than hand-writing a
//! `ToFirestoreValue` impl for every nested struct.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{ArrayValue, MapValue, Value};

/// Convert any JSON value into its Firestore wire representation.
pub fn json_to_firestore(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::NullValue(()),
        JsonValue::Bool(b) => Value::BooleanValue(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Value::StringValue(s.clone()),
        JsonValue::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_firestore).collect()),
        }),
        JsonValue::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_firestore(v)))
                    .collect(),
            ),
        }),
    }
}

/// Inverse of [`json_to_firestore`].
pub fn firestore_to_json(value: &Value) -> JsonValue {
    match value {
        Value::NullValue(()) => JsonValue::Null,
        Value::BooleanValue(b) => JsonValue::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::TimestampValue(s) | Value::StringValue(s) | Value::BytesValue(s) | Value::ReferenceValue(s) => {
            JsonValue::String(s.clone())
        }
        Value::GeoPointValue(gp) => serde_json::json!({"latitude": gp.latitude, "longitude": gp.longitude}),
        Value::ArrayValue(arr) => {
            JsonValue::Array(arr.values.iter().flatten().map(firestore_to_json).collect())
        }
        Value::MapValue(map) => JsonValue::Object(
            map.fields
                .iter()
                .flatten()
                .map(|(k, v)| (k.clone(), firestore_to_json(v)))
                .collect(),
        ),
    }
}

/// Serialize a model struct into the top-level field map a Firestore
/// document body needs. Fails if the struct doesn't serialize to a JSON
/// object.
pub fn struct_to_fields<T: serde::Serialize>(value: &T) -> FirestoreResult<HashMap<String, Value>> {
    let json = serde_json::to_value(value).map_err(FirestoreError::Json)?;
    match json {
        JsonValue::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, json_to_firestore(&v)))
            .collect()),
        _ => Err(FirestoreError::SerializationError(
            "expected a JSON object at the document root".to_string(),
        )),
    }
}

/// Deserialize a Firestore document's field map back into a model struct.
pub fn fields_to_struct<T: serde::de::DeserializeOwned>(
    fields: &HashMap<String, Value>,
) -> FirestoreResult<T> {
    let json = JsonValue::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), firestore_to_json(v)))
            .collect(),
    );
    serde_json::from_value(json).map_err(FirestoreError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
        tags: Vec<String>,
        nested: Option<Nested>,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Nested {
        flag: bool,
    }

    #[test]
    fn struct_round_trips_through_firestore_fields() {
        let original = Sample {
            name: "clip".to_string(),
            count: 7,
            tags: vec!["a".to_string(), "b".to_string()],
            nested: Some(Nested { flag: true }),
        };
        let fields = struct_to_fields(&original).unwrap();
        let restored: Sample = fields_to_struct(&fields).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn null_round_trips() {
        let fields = struct_to_fields(&Sample {
            name: String::new(),
            count: 0,
            tags: vec![],
            nested: None,
        })
        .unwrap();
        let restored: Sample = fields_to_struct(&fields).unwrap();
        assert_eq!(restored.nested, None);
    }
}
