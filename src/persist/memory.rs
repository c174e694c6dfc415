//! In-memory reference store.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::Mutex;

use crate::types::EntityId;

use super::{Document, DocumentBody, ModelRegistry, PersistError, PersistResult, PersistenceHandle};

/// Registry of in-memory models plus any custom handles registered by the host.
#[derive(Default)]
pub struct MemoryRegistry {
    models: HashMap<String, Arc<dyn PersistenceHandle>>,
}

impl MemoryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryRegistry::add_model`].
    pub fn with_model(mut self, logical_type: impl Into<String>) -> Self {
        self.add_model(logical_type);
        self
    }

    /// Registers a fresh in-memory model and returns it.
    pub fn add_model(&mut self, logical_type: impl Into<String>) -> Arc<MemoryModel> {
        let logical_type = logical_type.into();
        let model = Arc::new(MemoryModel::new(logical_type.clone()));
        self.models.insert(logical_type, model.clone());
        model
    }

    /// Registers a custom handle under its own logical type.
    pub fn register(&mut self, handle: Arc<dyn PersistenceHandle>) {
        self.models.insert(handle.logical_type().to_string(), handle);
    }
}

impl ModelRegistry for MemoryRegistry {
    fn model_for(&self, logical_type: &str) -> PersistResult<Arc<dyn PersistenceHandle>> {
        self.models
            .get(logical_type)
            .cloned()
            .ok_or_else(|| PersistError::UnknownModel(logical_type.to_string()))
    }
}

/// One logical type's documents, keyed by id.
pub struct MemoryModel {
    logical_type: String,
    docs: Mutex<HashMap<EntityId, DocumentBody>>,
    next_id: AtomicU64,
}

impl MemoryModel {
    /// Empty model.
    pub fn new(logical_type: impl Into<String>) -> Self {
        Self {
            logical_type: logical_type.into(),
            docs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    /// True when no document is stored.
    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }

    /// Inserts a document under a caller-chosen id, replacing any existing one.
    pub async fn seed(&self, id: impl Into<EntityId>, body: DocumentBody) {
        self.docs.lock().await.insert(id.into(), body);
    }

    fn assign_id(&self) -> EntityId {
        // 24 hex digits, the width of a document-store object id.
        format!("{:024x}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl PersistenceHandle for MemoryModel {
    fn logical_type(&self) -> &str {
        &self.logical_type
    }

    async fn create(&self, body: DocumentBody) -> PersistResult<Document> {
        let id = self.assign_id();
        self.docs.lock().await.insert(id.clone(), body.clone());
        Ok(Document { id, body })
    }

    async fn find_by_id(&self, id: &str) -> PersistResult<Option<Document>> {
        Ok(self.docs.lock().await.get(id).map(|body| Document {
            id: id.to_string(),
            body: body.clone(),
        }))
    }

    async fn update_by_id(&self, id: &str, body: DocumentBody) -> PersistResult<Document> {
        let mut docs = self.docs.lock().await;
        let stored = docs
            .get_mut(id)
            .ok_or_else(|| PersistError::not_found(&self.logical_type, id))?;
        stored.merge(body);
        Ok(Document {
            id: id.to_string(),
            body: stored.clone(),
        })
    }

    async fn delete_by_id(&self, id: &str) -> PersistResult<Document> {
        let body = self
            .docs
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| PersistError::not_found(&self.logical_type, id))?;
        Ok(Document {
            id: id.to_string(),
            body,
        })
    }
}
