//! Entity classification: logical type and mutation state of a wire entity.

use serde_json::Value;
use thiserror::Error;

use crate::{
    op::{ChangeRecord, EntityKey, EntityState},
    types::{ASPECT_KEY, Fields, ID_KEY, id_to_string},
};

const STATE_KEY: &str = "entityState";
const TYPE_NAME_KEY: &str = "entityTypeName";

/// Reasons a wire entity cannot be classified. All of them abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The entity is not a JSON object.
    #[error("entity {index} is not an object")]
    NotAnObject {
        /// Batch position.
        index: usize,
    },
    /// The `entityAspect` block is missing or malformed.
    #[error("entity {index} has no entity aspect")]
    MissingAspect {
        /// Batch position.
        index: usize,
    },
    /// The aspect carries no usable type name.
    #[error("entity {index} has no entity type name")]
    MissingTypeName {
        /// Batch position.
        index: usize,
    },
    /// The declared state is none of `Added`, `Modified`, `Deleted`.
    #[error("entity {index}: the given entity state {state:?} is not recognized")]
    UnrecognizedState {
        /// Batch position.
        index: usize,
        /// State as sent by the client.
        state: String,
    },
    /// A `Modified` or `Deleted` entity carries no id.
    #[error("entity {index} ({state:?}) has no id")]
    MissingEntityId {
        /// Batch position.
        index: usize,
        /// Declared state.
        state: EntityState,
    },
}

/// Splits a compound type identifier `"<Type>:#<namespace>"`.
///
/// The type name is everything before the first `:`.
pub fn split_type_name(compound: &str) -> (&str, Option<&str>) {
    match compound.split_once(':') {
        Some((name, rest)) => {
            let ns = rest.trim_start_matches('#');
            (name, (!ns.is_empty()).then_some(ns))
        }
        None => (compound, None),
    }
}

/// Classifies the wire entity at `index` of a batch.
pub fn classify(index: usize, entity: &Value) -> Result<ChangeRecord, ClassifyError> {
    let fields: &Fields = entity
        .as_object()
        .ok_or(ClassifyError::NotAnObject { index })?;
    let aspect = fields
        .get(ASPECT_KEY)
        .and_then(Value::as_object)
        .ok_or(ClassifyError::MissingAspect { index })?;

    let compound = aspect
        .get(TYPE_NAME_KEY)
        .and_then(Value::as_str)
        .ok_or(ClassifyError::MissingTypeName { index })?;
    let (logical_type, namespace) = split_type_name(compound);
    if logical_type.is_empty() {
        return Err(ClassifyError::MissingTypeName { index });
    }

    let raw_state = match aspect.get(STATE_KEY) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let state = EntityState::parse(&raw_state).ok_or(ClassifyError::UnrecognizedState {
        index,
        state: raw_state,
    })?;

    let id = fields.get(ID_KEY).filter(|v| !v.is_null());
    let key = match state {
        EntityState::Added => EntityKey::Temporary(id.cloned().unwrap_or(Value::Null)),
        EntityState::Modified | EntityState::Deleted => {
            let id = id.ok_or(ClassifyError::MissingEntityId { index, state })?;
            EntityKey::Persisted(id_to_string(id))
        }
    };

    Ok(ChangeRecord {
        index,
        logical_type: logical_type.to_string(),
        namespace: namespace.map(str::to_string),
        state,
        key,
        fields: fields.clone(),
    })
}

/// Classifies a whole batch, failing on the first unclassifiable entity.
pub fn classify_all(entities: &[Value]) -> Result<Vec<ChangeRecord>, ClassifyError> {
    entities
        .iter()
        .enumerate()
        .map(|(index, entity)| classify(index, entity))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn type_name_stops_at_first_separator() {
        assert_eq!(split_type_name("Order:#App.Model"), ("Order", Some("App.Model")));
        assert_eq!(split_type_name("Order"), ("Order", None));
        assert_eq!(split_type_name("Order:#"), ("Order", None));
        assert_eq!(split_type_name("A:b:c"), ("A", Some("b:c")));
    }

    #[test]
    fn added_entity_keeps_temp_id() {
        let rec = classify(
            3,
            &json!({
                "id": -1,
                "name": "x",
                "entityAspect": { "entityTypeName": "Foo:#ns", "entityState": "Added" }
            }),
        )
        .expect("classify");
        assert_eq!(rec.index, 3);
        assert_eq!(rec.logical_type, "Foo");
        assert_eq!(rec.namespace.as_deref(), Some("ns"));
        assert_eq!(rec.state, EntityState::Added);
        assert_eq!(rec.temporary_id(), Some(&json!(-1)));
        assert_eq!(rec.persisted_id(), None);
    }

    #[test]
    fn modified_entity_requires_id() {
        let err = classify(
            0,
            &json!({ "entityAspect": { "entityTypeName": "Foo", "entityState": "Modified" } }),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClassifyError::MissingEntityId {
                index: 0,
                state: EntityState::Modified
            }
        );
    }

    #[test]
    fn numeric_persisted_id_becomes_string() {
        let rec = classify(
            0,
            &json!({ "id": 7, "entityAspect": { "entityTypeName": "Foo", "entityState": "Deleted" } }),
        )
        .expect("classify");
        assert_eq!(rec.persisted_id(), Some("7"));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let err = classify(
            1,
            &json!({ "id": "a", "entityAspect": { "entityTypeName": "Foo", "entityState": "Unchanged" } }),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClassifyError::UnrecognizedState {
                index: 1,
                state: "Unchanged".to_string()
            }
        );
    }

    #[test]
    fn classify_all_reports_first_bad_entity() {
        let entities = vec![
            json!({ "id": 1, "entityAspect": { "entityTypeName": "Foo", "entityState": "Added" } }),
            json!([1, 2]),
            json!({ "entityAspect": {} }),
        ];
        assert_eq!(
            classify_all(&entities).unwrap_err(),
            ClassifyError::NotAnObject { index: 1 }
        );
    }
}
