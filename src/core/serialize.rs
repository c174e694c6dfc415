//! Builds result entities and key mappings with batch-local sequence refs.

use serde_json::Value;

use crate::{
    result::{KeyMapping, ResultEntity},
    types::{EntityId, Fields, ID_KEY, SeqRef},
};

/// Monotonic batch-local sequence, starting at 1.
#[derive(Debug)]
pub struct SequenceCounter {
    next: SeqRef,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl SequenceCounter {
    /// Fresh counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the next value.
    pub fn next_ref(&mut self) -> SeqRef {
        let seq = self.next;
        self.next += 1;
        seq
    }

    /// Number of values handed out so far.
    pub fn issued(&self) -> SeqRef {
        self.next - 1
    }
}

/// Type-reference strings clients use to resolve result objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNaming {
    /// Namespace of domain entity types.
    pub type_namespace: String,
    /// Namespace of the save-result envelope types.
    pub result_namespace: String,
}

impl TypeNaming {
    /// `"<ns>.<Type>, <ns>"`.
    pub fn entity_type_ref(&self, logical_type: &str) -> String {
        format!("{ns}.{logical_type}, {ns}", ns = self.type_namespace)
    }

    /// `"<ns>.<Type>"`.
    pub fn entity_type_name(&self, logical_type: &str) -> String {
        format!("{}.{logical_type}", self.type_namespace)
    }

    /// Envelope type reference for `kind` (`SaveResult`, `KeyMapping`).
    pub fn result_type_ref(&self, kind: &str) -> String {
        format!("{ns}.{kind}, {ns}", ns = self.result_namespace)
    }
}

/// Builds the result entity for a saved document.
///
/// `fields` are the client's wire fields for creates, or the persisted
/// document's serialization for updates and deletes. The header (`$id`,
/// `$type`, `id`) always wins over same-named fields.
pub fn result_entity(
    seq: &mut SequenceCounter,
    naming: &TypeNaming,
    logical_type: &str,
    id: EntityId,
    fields: Fields,
) -> ResultEntity {
    let fields = fields
        .into_iter()
        .filter(|(key, _)| key != ID_KEY && key != "$id" && key != "$type")
        .collect();
    ResultEntity {
        seq: seq.next_ref(),
        type_ref: naming.entity_type_ref(logical_type),
        id,
        fields,
    }
}

/// Pairs a created entity's temp id with its store-assigned id.
pub fn key_mapping(
    seq: &mut SequenceCounter,
    naming: &TypeNaming,
    logical_type: &str,
    temp_value: Value,
    real_value: EntityId,
) -> KeyMapping {
    KeyMapping {
        seq: seq.next_ref(),
        type_ref: naming.result_type_ref("KeyMapping"),
        entity_type_name: naming.entity_type_name(logical_type),
        temp_value,
        real_value,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn naming() -> TypeNaming {
        TypeNaming {
            type_namespace: "Model".into(),
            result_namespace: "breeze.mongoose".into(),
        }
    }

    #[test]
    fn type_refs() {
        let n = naming();
        assert_eq!(n.entity_type_ref("Foo"), "Model.Foo, Model");
        assert_eq!(n.entity_type_name("Foo"), "Model.Foo");
        assert_eq!(n.result_type_ref("SaveResult"), "breeze.mongoose.SaveResult, breeze.mongoose");
    }

    #[test]
    fn header_overrides_client_id() {
        let mut seq = SequenceCounter::new();
        let fields = json!({ "id": -5, "name": "x" }).as_object().cloned().unwrap_or_default();
        let entity = result_entity(&mut seq, &naming(), "Foo", "real".into(), fields);
        assert_eq!(entity.seq, 1);
        assert_eq!(entity.id, "real");
        assert_eq!(entity.fields.get("id"), None);
        assert_eq!(entity.fields.get("name"), Some(&json!("x")));
    }

    #[test]
    fn sequence_advances_across_kinds() {
        let mut seq = SequenceCounter::new();
        let e = result_entity(&mut seq, &naming(), "Foo", "a".into(), Fields::new());
        let k = key_mapping(&mut seq, &naming(), "Foo", json!(-1), "a".into());
        assert_eq!((e.seq, k.seq), (1, 2));
        assert_eq!(k.entity_type_name, "Model.Foo");
        assert_eq!(k.temp_value, json!(-1));
        assert_eq!(seq.issued(), 2);
    }
}
