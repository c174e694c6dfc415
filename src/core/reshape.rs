//! Splits wire records into the store's document shape.

use serde_json::Value;

use crate::{
    persist::{DocumentBody, EmbeddedField},
    types::{Fields, ID_KEY},
};

/// Copies `fields` without the transport-only keys in `metadata_keys`.
pub fn strip_metadata(fields: &Fields, metadata_keys: &[String]) -> Fields {
    fields
        .iter()
        .filter(|(key, _)| !metadata_keys.iter().any(|m| m == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Partitions domain fields into scalar/reference fields and embedded
/// sub-documents. Each embedded object becomes a single-element collection.
pub fn reshape(fields: &Fields, metadata_keys: &[String]) -> DocumentBody {
    let mut body = DocumentBody::default();
    for (key, value) in strip_metadata(fields, metadata_keys) {
        match value {
            Value::Object(doc) => body.embedded.push(EmbeddedField::single(key, doc)),
            other => {
                body.fields.insert(key, other);
            }
        }
    }
    body
}

/// Same as [`reshape`], minus the client-supplied `id`.
pub fn reshape_without_id(fields: &Fields, metadata_keys: &[String]) -> DocumentBody {
    let mut body = reshape(fields, metadata_keys);
    body.fields.remove(ID_KEY);
    body
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn keys() -> Vec<String> {
        vec!["entityAspect".to_string()]
    }

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn partitions_embedded_objects() {
        let input = fields(json!({
            "id": -1,
            "name": "Ada",
            "tags": ["a", "b"],
            "owner": null,
            "address": { "city": "X" },
            "entityAspect": { "entityState": "Added" }
        }));
        let body = reshape(&input, &keys());

        assert_eq!(
            body.fields,
            fields(json!({ "id": -1, "name": "Ada", "tags": ["a", "b"], "owner": null }))
        );
        assert_eq!(
            body.embedded,
            vec![EmbeddedField::single("address", fields(json!({ "city": "X" })))]
        );
    }

    #[test]
    fn input_is_left_untouched() {
        let input = fields(json!({ "id": 1, "entityAspect": {} }));
        let before = input.clone();
        let body = reshape_without_id(&input, &keys());
        assert!(body.fields.is_empty());
        assert!(body.embedded.is_empty());
        assert_eq!(input, before);
    }

    #[test]
    fn strip_keeps_field_order() {
        let input = fields(json!({ "b": 1, "entityAspect": {}, "a": 2 }));
        let names: Vec<_> = strip_metadata(&input, &keys()).keys().cloned().collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }
}
