use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::{task::JoinSet, time::Duration};
use tracing::{info, warn};

use crate::{
    core::{
        classify::{ClassifyError, classify_all},
        serialize::TypeNaming,
    },
    engine::executor::MutationExecutor,
    op::{EntityState, SaveBundle},
    persist::{ModelRegistry, PersistError},
    result::SaveResult,
    types::ASPECT_KEY,
};

use super::{batch::BatchState, tracker::Progress};

/// Why a batch was rejected.
///
/// A rejection says nothing about which mutations were applied: entities
/// that completed before or alongside the failure stay persisted.
#[derive(Debug, Error)]
pub enum SaveError {
    /// An entity could not be classified. Raised before any store call.
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    /// A store call failed.
    #[error("entity {index} ({logical_type}, {state:?}): {source}")]
    Store {
        /// Batch position.
        index: usize,
        /// Logical type.
        logical_type: String,
        /// Declared state.
        state: EntityState,
        /// Store failure.
        #[source]
        source: PersistError,
    },
    /// The batch deadline expired before any entity failed.
    #[error("batch did not complete within {after_ms} ms")]
    Timeout {
        /// Configured deadline.
        after_ms: u64,
    },
    /// A mutation task panicked.
    #[error("mutation task failed: {0}")]
    Task(String),
}

/// What the dispatcher does once an entity fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Wait for every in-flight mutation to report, then reject with the first error.
    #[default]
    Drain,
    /// Reject on the first error; in-flight mutations keep running detached.
    FailFast,
}

/// Change-set processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Namespace of entity types in `$type` and `EntityTypeName`.
    pub type_namespace: String,
    /// Namespace of the `SaveResult`/`KeyMapping` types.
    pub result_namespace: String,
    /// Transport-only keys never sent to the store.
    pub metadata_keys: Vec<String>,
    /// Batch deadline; pending mutations are aborted when it expires.
    pub deadline_ms: Option<u64>,
    /// Behavior after the first failure.
    pub failure_mode: FailureMode,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            type_namespace: "Model".to_string(),
            result_namespace: "breeze.mongoose".to_string(),
            metadata_keys: vec![ASPECT_KEY.to_string()],
            deadline_ms: None,
            failure_mode: FailureMode::Drain,
        }
    }
}

impl ProcessorConfig {
    fn naming(&self) -> TypeNaming {
        TypeNaming {
            type_namespace: self.type_namespace.clone(),
            result_namespace: self.result_namespace.clone(),
        }
    }
}

/// Entry point: applies change sets against a [`ModelRegistry`].
///
/// Each call owns its batch state, so concurrent calls never share counters.
pub struct ChangeSetProcessor<R> {
    registry: Arc<R>,
    executor: MutationExecutor,
    config: ProcessorConfig,
}

impl<R> Clone for ChangeSetProcessor<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            executor: self.executor.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: ModelRegistry + 'static> ChangeSetProcessor<R> {
    /// Processor over `registry`.
    pub fn new(registry: Arc<R>, config: ProcessorConfig) -> Self {
        let executor = MutationExecutor::new(config.metadata_keys.clone());
        Self {
            registry,
            executor,
            config,
        }
    }

    /// Active settings.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Processes a save bundle. See [`ChangeSetProcessor::process_batch`].
    pub async fn save_changes(&self, bundle: SaveBundle) -> Result<SaveResult, SaveError> {
        self.process_batch(&bundle.entities).await
    }

    /// Applies every entity concurrently and returns the reconciled result.
    ///
    /// Classification and model lookup happen for the whole batch before any
    /// store call, so a malformed entity or unknown type rejects the batch
    /// with nothing applied. Store failures are not rolled back.
    pub async fn process_batch(&self, entities: &[Value]) -> Result<SaveResult, SaveError> {
        let records = classify_all(entities)?;
        let mut handles = Vec::with_capacity(records.len());
        for record in &records {
            let handle = self
                .registry
                .model_for(&record.logical_type)
                .map_err(|source| SaveError::Store {
                    index: record.index,
                    logical_type: record.logical_type.clone(),
                    state: record.state,
                    source,
                })?;
            handles.push(handle);
        }

        let batch = Arc::new(BatchState::new(records.len(), self.config.naming()));
        info!(entities = records.len(), "processing change set");

        let mut tasks = JoinSet::new();
        for (record, handle) in records.into_iter().zip(handles) {
            let batch = Arc::clone(&batch);
            let executor = self.executor.clone();
            tasks.spawn(async move {
                let outcome = executor.execute(&*handle, &record).await;
                batch.complete(&record, outcome).await;
            });
        }

        let settling = settle(&batch, &mut tasks, self.config.failure_mode);
        let settled = match self.config.deadline_ms {
            Some(after_ms) => tokio::time::timeout(Duration::from_millis(after_ms), settling)
                .await
                .map_err(|_| SaveError::Timeout { after_ms }),
            None => Ok(settling.await),
        };

        if let Err(timeout) = settled {
            warn!(progress = ?batch.tracker().progress(), "change set timed out; aborting pending mutations");
            tasks.abort_all();
            // A failure seen before the deadline is the more useful answer.
            return Err(batch.take_error().await.unwrap_or(timeout));
        }
        // Dropping the set would abort stragglers left running by `FailFast`.
        tasks.detach_all();

        if let Some(err) = batch.take_error().await {
            warn!(progress = ?batch.tracker().progress(), error = %err, "change set rejected");
            return Err(err);
        }

        let result = batch.finish().await;
        info!(
            entities = result.entities.len(),
            key_mappings = result.key_mappings.len(),
            "change set saved"
        );
        Ok(result)
    }
}

/// Waits until the failure mode's stop condition holds, counting panicked
/// mutations as failures so the tracker can still complete.
async fn settle(batch: &BatchState, tasks: &mut JoinSet<()>, mode: FailureMode) {
    let target = batch.tracker().target();
    let stop = move |p: &Progress| {
        p.processed >= target || (mode == FailureMode::FailFast && p.failed > 0)
    };

    loop {
        tokio::select! {
            biased;
            _ = batch.tracker().wait_until(stop) => return,
            joined = tasks.join_next(), if !tasks.is_empty() => {
                if let Some(Err(err)) = joined {
                    if err.is_panic() {
                        batch.fail_unreported(SaveError::Task(err.to_string())).await;
                    }
                }
            }
        }
    }
}
