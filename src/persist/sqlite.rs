//! SQLite-backed reference store.
//!
//! Every model shares one `documents` table. Scalar fields and embedded
//! sub-document collections are kept in separate JSON columns.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use hashbrown::HashSet;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;

use crate::types::Fields;

use super::{
    Document, DocumentBody, EmbeddedField, ModelRegistry, PersistError, PersistResult,
    PersistenceHandle,
};

/// Registry whose models persist into one SQLite database.
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
    models: HashSet<String>,
}

impl SqliteRegistry {
    /// Opens or creates a database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            models: HashSet::new(),
        })
    }

    /// Builder form of [`SqliteRegistry::add_model`].
    pub fn with_model(mut self, logical_type: impl Into<String>) -> Self {
        self.add_model(logical_type);
        self
    }

    /// Makes `logical_type` resolvable through [`ModelRegistry::model_for`].
    pub fn add_model(&mut self, logical_type: impl Into<String>) {
        self.models.insert(logical_type.into());
    }
}

impl ModelRegistry for SqliteRegistry {
    fn model_for(&self, logical_type: &str) -> PersistResult<Arc<dyn PersistenceHandle>> {
        if !self.models.contains(logical_type) {
            return Err(PersistError::UnknownModel(logical_type.to_string()));
        }
        Ok(Arc::new(SqliteModel {
            logical_type: logical_type.to_string(),
            conn: Arc::clone(&self.conn),
        }))
    }
}

/// Handle for one logical type inside a [`SqliteRegistry`].
pub struct SqliteModel {
    logical_type: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteModel {
    async fn with_conn<T, F>(&self, f: F) -> PersistResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> PersistResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let model = self.logical_type.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn, &model)
        })
        .await
        .map_err(|e| PersistError::Message(format!("join error: {e}")))?
    }
}

#[async_trait]
impl PersistenceHandle for SqliteModel {
    fn logical_type(&self) -> &str {
        &self.logical_type
    }

    async fn create(&self, body: DocumentBody) -> PersistResult<Document> {
        self.with_conn(move |conn, model| {
            let (fields, embedded) = encode_body(&body)?;
            conn.execute(
                "INSERT INTO documents(model, fields, embedded) VALUES (?1, ?2, ?3)",
                params![model, fields, embedded],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Document {
                id: id.to_string(),
                body,
            })
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> PersistResult<Option<Document>> {
        let id = id.to_string();
        self.with_conn(move |conn, model| load(conn, model, &id)).await
    }

    async fn update_by_id(&self, id: &str, body: DocumentBody) -> PersistResult<Document> {
        let id = id.to_string();
        self.with_conn(move |conn, model| {
            let tx = conn.transaction()?;
            let mut doc = load(&tx, model, &id)?.ok_or_else(|| PersistError::not_found(model, &id))?;
            doc.body.merge(body);
            let (fields, embedded) = encode_body(&doc.body)?;
            tx.execute(
                "UPDATE documents SET fields = ?1, embedded = ?2 WHERE id = ?3 AND model = ?4",
                params![fields, embedded, row_id(&id), model],
            )?;
            tx.commit()?;
            Ok(doc)
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> PersistResult<Document> {
        let id = id.to_string();
        self.with_conn(move |conn, model| {
            let tx = conn.transaction()?;
            let doc = load(&tx, model, &id)?.ok_or_else(|| PersistError::not_found(model, &id))?;
            tx.execute(
                "DELETE FROM documents WHERE id = ?1 AND model = ?2",
                params![row_id(&id), model],
            )?;
            tx.commit()?;
            Ok(doc)
        })
        .await
    }
}

/// Non-numeric ids can never match a row.
fn row_id(id: &str) -> Option<i64> {
    id.parse().ok()
}

fn load(conn: &Connection, model: &str, id: &str) -> PersistResult<Option<Document>> {
    let Some(row_id) = row_id(id) else {
        return Ok(None);
    };
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT fields, embedded FROM documents WHERE id = ?1 AND model = ?2",
            params![row_id, model],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((fields, embedded)) = row else {
        return Ok(None);
    };
    let fields: Fields = serde_json::from_str(&fields)?;
    let embedded: Vec<EmbeddedField> = serde_json::from_str(&embedded)?;
    Ok(Some(Document {
        id: row_id.to_string(),
        body: DocumentBody { fields, embedded },
    }))
}

fn encode_body(body: &DocumentBody) -> PersistResult<(String, String)> {
    Ok((
        serde_json::to_string(&body.fields)?,
        serde_json::to_string(&body.embedded)?,
    ))
}
