//! Inbound change-set model: save bundles and classified change records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntityId, Fields};

/// Client-asserted mutation state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// New entity carrying a temporary id.
    Added,
    /// Existing entity whose fields changed.
    Modified,
    /// Existing entity to remove.
    Deleted,
}

impl EntityState {
    /// Parses the wire spelling of a state, `None` for anything unknown.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Added" => Some(Self::Added),
            "Modified" => Some(Self::Modified),
            "Deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
        }
    }
}

/// Identity carried by a change record, depending on its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKey {
    /// Client placeholder id of an `Added` entity. May be `Null` when absent.
    Temporary(Value),
    /// Permanent id of a `Modified` or `Deleted` entity.
    Persisted(EntityId),
}

/// One classified, immutable client mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Position of the record in its batch.
    pub index: usize,
    /// Logical type name, e.g. `Customer`.
    pub logical_type: String,
    /// Namespace suffix of the compound type name, when present.
    pub namespace: Option<String>,
    /// Declared mutation state.
    pub state: EntityState,
    /// Temporary or persisted id.
    pub key: EntityKey,
    /// Every wire field as received, transport metadata included.
    pub fields: Fields,
}

impl ChangeRecord {
    /// Client temp id, for `Added` records.
    pub fn temporary_id(&self) -> Option<&Value> {
        match &self.key {
            EntityKey::Temporary(v) => Some(v),
            EntityKey::Persisted(_) => None,
        }
    }

    /// Permanent id, for `Modified`/`Deleted` records.
    pub fn persisted_id(&self) -> Option<&str> {
        match &self.key {
            EntityKey::Persisted(id) => Some(id),
            EntityKey::Temporary(_) => None,
        }
    }
}

/// Batch of raw wire entities submitted together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBundle {
    /// Raw wire entities, in submission order.
    pub entities: Vec<Value>,
    /// Client save options. Accepted and ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_options: Option<Value>,
}

impl SaveBundle {
    /// Builds a bundle from raw entities.
    pub fn new(entities: Vec<Value>) -> Self {
        Self {
            entities,
            save_options: None,
        }
    }

    /// Number of entities in the bundle.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when the bundle carries no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EntityState, SaveBundle};

    #[test]
    fn unknown_states_do_not_parse() {
        assert_eq!(EntityState::parse("Added"), Some(EntityState::Added));
        assert_eq!(EntityState::parse("Unchanged"), None);
        assert_eq!(EntityState::parse("added"), None);
    }

    #[test]
    fn bundle_accepts_save_options() {
        let bundle: SaveBundle = serde_json::from_value(json!({
            "entities": [{ "id": 1 }],
            "saveOptions": { "allowConcurrentSaves": false }
        }))
        .expect("bundle");
        assert_eq!(bundle.len(), 1);
        assert!(bundle.save_options.is_some());
    }
}
