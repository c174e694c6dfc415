//! Outbound save-result model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntityId, Fields, SeqRef};

/// Wire projection of one persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntity {
    /// Batch-local sequence reference.
    #[serde(rename = "$id")]
    pub seq: SeqRef,
    /// Client-resolvable type reference.
    #[serde(rename = "$type")]
    pub type_ref: String,
    /// Permanent id.
    pub id: EntityId,
    /// Domain fields in wire shape.
    #[serde(flatten)]
    pub fields: Fields,
}

/// Temp id to permanent id resolution for one created entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyMapping {
    /// Batch-local sequence reference.
    #[serde(rename = "$id")]
    pub seq: SeqRef,
    /// Key-mapping type reference.
    #[serde(rename = "$type")]
    pub type_ref: String,
    /// Namespace-qualified entity type name.
    pub entity_type_name: String,
    /// Client placeholder id.
    pub temp_value: Value,
    /// Store-assigned id.
    pub real_value: EntityId,
}

/// Reconciled outcome of one batch, in completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveResult {
    /// Batch-local sequence reference of the envelope.
    #[serde(rename = "$id")]
    pub seq: SeqRef,
    /// Save-result type reference.
    #[serde(rename = "$type")]
    pub type_ref: String,
    /// One entry per saved entity.
    pub entities: Vec<ResultEntity>,
    /// One entry per created entity.
    pub key_mappings: Vec<KeyMapping>,
}

impl SaveResult {
    /// Every sequence reference in the result, envelope included.
    pub fn sequence_refs(&self) -> Vec<SeqRef> {
        std::iter::once(self.seq)
            .chain(self.entities.iter().map(|e| e.seq))
            .chain(self.key_mappings.iter().map(|k| k.seq))
            .collect()
    }

    /// Finds the result entity with permanent id `id`.
    pub fn entity(&self, id: &str) -> Option<&ResultEntity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_shape_uses_breeze_keys() {
        let result = SaveResult {
            seq: 1,
            type_ref: "r.SaveResult, r".into(),
            entities: vec![ResultEntity {
                seq: 2,
                type_ref: "m.Foo, m".into(),
                id: "abc".into(),
                fields: json!({ "name": "x" }).as_object().cloned().unwrap_or_default(),
            }],
            key_mappings: vec![KeyMapping {
                seq: 3,
                type_ref: "r.KeyMapping, r".into(),
                entity_type_name: "m.Foo".into(),
                temp_value: json!(-1),
                real_value: "abc".into(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&result).expect("json"),
            json!({
                "$id": 1,
                "$type": "r.SaveResult, r",
                "Entities": [{ "$id": 2, "$type": "m.Foo, m", "id": "abc", "name": "x" }],
                "KeyMappings": [{
                    "$id": 3,
                    "$type": "r.KeyMapping, r",
                    "EntityTypeName": "m.Foo",
                    "TempValue": -1,
                    "RealValue": "abc"
                }]
            })
        );
        assert_eq!(result.sequence_refs(), vec![1, 2, 3]);
    }
}
