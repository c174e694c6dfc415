//! Applies one classified change record against its persistence handle.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{
    core::reshape::{reshape_without_id, strip_metadata},
    op::{ChangeRecord, EntityKey, EntityState},
    persist::{PersistError, PersistResult, PersistenceHandle},
    types::{EntityId, Fields},
};

/// What one successful mutation reports back to the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new document was persisted.
    Created {
        /// Logical type.
        logical_type: String,
        /// Store-assigned id.
        id: EntityId,
        /// Client temp id.
        temp_id: Value,
        /// Client wire fields, metadata stripped.
        wire: Fields,
    },
    /// An existing document was updated or removed.
    Persisted {
        /// Logical type.
        logical_type: String,
        /// Permanent id.
        id: EntityId,
        /// Wire serialization of the document the store returned.
        fields: Fields,
    },
}

/// Runs create/update/delete for change records.
#[derive(Debug, Clone)]
pub struct MutationExecutor {
    metadata_keys: Arc<[String]>,
}

impl MutationExecutor {
    /// Executor stripping `metadata_keys` before anything reaches the store.
    pub fn new(metadata_keys: impl Into<Arc<[String]>>) -> Self {
        Self {
            metadata_keys: metadata_keys.into(),
        }
    }

    /// Dispatches on the record's mutation state.
    pub async fn execute(
        &self,
        handle: &dyn PersistenceHandle,
        record: &ChangeRecord,
    ) -> PersistResult<Outcome> {
        match (&record.state, &record.key) {
            (EntityState::Added, EntityKey::Temporary(temp_id)) => {
                self.create(handle, record, temp_id.clone()).await
            }
            (EntityState::Modified, EntityKey::Persisted(id)) => self.update(handle, record, id).await,
            (EntityState::Deleted, EntityKey::Persisted(id)) => self.delete(handle, id).await,
            (state, _) => Err(PersistError::Message(format!(
                "entity {} carries an id that does not match state {state:?}",
                record.index
            ))),
        }
    }

    async fn create(
        &self,
        handle: &dyn PersistenceHandle,
        record: &ChangeRecord,
        temp_id: Value,
    ) -> PersistResult<Outcome> {
        let body = reshape_without_id(&record.fields, &self.metadata_keys);
        let created = handle.create(body).await?;

        // Re-read so the outcome reflects what the store actually kept.
        let stored = handle
            .find_by_id(&created.id)
            .await?
            .ok_or_else(|| PersistError::not_found(handle.logical_type(), &created.id))?;
        debug!(
            logical_type = handle.logical_type(),
            id = %stored.id,
            temp_id = %temp_id,
            "entity created"
        );

        Ok(Outcome::Created {
            logical_type: record.logical_type.clone(),
            id: stored.id,
            temp_id,
            wire: strip_metadata(&record.fields, &self.metadata_keys),
        })
    }

    async fn update(
        &self,
        handle: &dyn PersistenceHandle,
        record: &ChangeRecord,
        id: &str,
    ) -> PersistResult<Outcome> {
        let body = reshape_without_id(&record.fields, &self.metadata_keys);
        let updated = handle.update_by_id(id, body).await?;
        debug!(logical_type = handle.logical_type(), id, "entity updated");

        Ok(Outcome::Persisted {
            logical_type: record.logical_type.clone(),
            fields: handle.serialize(&updated),
            id: updated.id,
        })
    }

    async fn delete(&self, handle: &dyn PersistenceHandle, id: &str) -> PersistResult<Outcome> {
        let removed = handle.delete_by_id(id).await?;
        debug!(logical_type = handle.logical_type(), id, "entity deleted");

        Ok(Outcome::Persisted {
            logical_type: handle.logical_type().to_string(),
            fields: handle.serialize(&removed),
            id: removed.id,
        })
    }
}
