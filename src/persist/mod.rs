//! Store collaborator interface and stored-document model.
//!
//! The engine never talks to a storage engine directly. It resolves a
//! [`PersistenceHandle`] per logical type through a [`ModelRegistry`] and
//! issues create/find/update/delete calls against it.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{EntityId, Fields};

/// Failure raised by a store call.
#[derive(Debug, Error)]
pub enum PersistError {
    /// No model is registered for the logical type.
    #[error("no model registered for type {0:?}")]
    UnknownModel(String),
    /// No document with this id exists for the model.
    #[error("{model} {id:?} not found")]
    NotFound {
        /// Logical type.
        model: String,
        /// Requested id.
        id: EntityId,
    },
    /// SQLite backend failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Stored payload could not be encoded or decoded.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Any other backend failure.
    #[error("{0}")]
    Message(String),
}

impl PersistError {
    /// Shorthand for [`PersistError::NotFound`].
    pub fn not_found(model: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self::NotFound {
            model: model.into(),
            id: id.into(),
        }
    }
}

/// Result alias for store calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Embedded sub-documents stored under one field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedField {
    /// Owning field name.
    pub name: String,
    /// Embedded documents, in stored order.
    pub docs: Vec<Fields>,
}

impl EmbeddedField {
    /// Wraps one embedded object into a single-element collection.
    pub fn single(name: impl Into<String>, doc: Fields) -> Self {
        Self {
            name: name.into(),
            docs: vec![doc],
        }
    }
}

/// Store-side shape of a document: scalar/reference fields and embedded
/// sub-document collections kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentBody {
    /// Scalar and reference fields.
    pub fields: Fields,
    /// Embedded sub-document collections.
    pub embedded: Vec<EmbeddedField>,
}

impl DocumentBody {
    /// Looks up an embedded collection by field name.
    pub fn embedded(&self, name: &str) -> Option<&EmbeddedField> {
        self.embedded.iter().find(|e| e.name == name)
    }

    /// Overwrites every field present in `patch`, keeping the rest.
    ///
    /// A name lives in one partition only: patching it in one drops it from
    /// the other.
    pub fn merge(&mut self, patch: DocumentBody) {
        for (key, value) in patch.fields {
            self.embedded.retain(|e| e.name != key);
            self.fields.insert(key, value);
        }
        for field in patch.embedded {
            self.fields.remove(&field.name);
            match self.embedded.iter_mut().find(|e| e.name == field.name) {
                Some(existing) => existing.docs = field.docs,
                None => self.embedded.push(field),
            }
        }
    }

    /// Flattens back to wire shape.
    ///
    /// A collection holding exactly one sub-document is unwrapped to that
    /// object; any other collection is emitted as an array.
    pub fn to_wire(&self) -> Fields {
        let mut out = self.fields.clone();
        for field in &self.embedded {
            let value = match field.docs.as_slice() {
                [single] => Value::Object(single.clone()),
                docs => Value::Array(docs.iter().cloned().map(Value::Object).collect()),
            };
            out.insert(field.name.clone(), value);
        }
        out
    }
}

/// A document as persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned id.
    pub id: EntityId,
    /// Stored content.
    pub body: DocumentBody,
}

/// Type-specific persistence handle returned by [`ModelRegistry::model_for`].
#[async_trait]
pub trait PersistenceHandle: Send + Sync {
    /// Logical type served by this handle.
    fn logical_type(&self) -> &str;

    /// Persists a new document; the store assigns its id.
    async fn create(&self, body: DocumentBody) -> PersistResult<Document>;

    /// Fetches a document, `None` when absent.
    async fn find_by_id(&self, id: &str) -> PersistResult<Option<Document>>;

    /// Overwrites the fields present in `body` and returns the stored document.
    async fn update_by_id(&self, id: &str, body: DocumentBody) -> PersistResult<Document>;

    /// Removes a document and returns it.
    async fn delete_by_id(&self, id: &str) -> PersistResult<Document>;

    /// Wire projection of a persisted document.
    ///
    /// Models override this to customise the fields sent back to clients.
    fn serialize(&self, doc: &Document) -> Fields {
        doc.body.to_wire()
    }
}

/// Resolves persistence handles by logical type.
pub trait ModelRegistry: Send + Sync {
    /// Returns the handle for `logical_type`.
    fn model_for(&self, logical_type: &str) -> PersistResult<Arc<dyn PersistenceHandle>>;
}
