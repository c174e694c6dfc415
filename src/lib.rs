//! Change-set persistence: applies batches of client-asserted entity
//! mutations against a document store and reconciles what was persisted.
//!
//! # Examples
//!
//! Saving a new entity through the in-memory store:
//! ```
//! use std::sync::Arc;
//!
//! use changeset::{
//!     op::SaveBundle,
//!     persist::memory::MemoryRegistry,
//!     runtime::processor::{ChangeSetProcessor, ProcessorConfig},
//! };
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(MemoryRegistry::new().with_model("Customer"));
//! let processor = ChangeSetProcessor::new(registry, ProcessorConfig::default());
//!
//! let result = processor
//!     .save_changes(SaveBundle::new(vec![json!({
//!         "id": -1,
//!         "name": "Ada",
//!         "address": { "city": "London" },
//!         "entityAspect": { "entityTypeName": "Customer:#App", "entityState": "Added" }
//!     })]))
//!     .await
//!     .expect("save");
//!
//! assert_eq!(result.entities.len(), 1);
//! assert_eq!(result.key_mappings[0].temp_value, json!(-1));
//! assert_eq!(result.key_mappings[0].real_value, result.entities[0].id);
//! # }
//! ```
//!
//! SQLite-backed store:
//! ```no_run
//! use std::sync::Arc;
//!
//! use changeset::{
//!     persist::sqlite::SqliteRegistry,
//!     runtime::processor::{ChangeSetProcessor, FailureMode, ProcessorConfig},
//! };
//!
//! let registry = SqliteRegistry::open("documents.db")
//!     .expect("open sqlite")
//!     .with_model("Customer")
//!     .with_model("Order");
//! let cfg = ProcessorConfig {
//!     deadline_ms: Some(5_000),
//!     failure_mode: FailureMode::FailFast,
//!     ..ProcessorConfig::default()
//! };
//! let _processor = ChangeSetProcessor::new(Arc::new(registry), cfg);
//! ```
#![deny(missing_docs)]

/// Pure per-entity transformations.
pub mod core;
/// Mutation execution against the store.
pub mod engine;
/// Inbound change-set model.
pub mod op;
/// Store collaborator interface and reference stores.
pub mod persist;
/// Outbound save-result model.
pub mod result;
/// Batch dispatch and completion tracking.
pub mod runtime;
/// Shared ids and field-map aliases.
pub mod types;
