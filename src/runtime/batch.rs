//! Per-invocation batch state shared by a batch's in-flight mutations.

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    core::serialize::{SequenceCounter, TypeNaming, key_mapping, result_entity},
    engine::executor::Outcome,
    op::ChangeRecord,
    persist::PersistResult,
    result::{KeyMapping, ResultEntity, SaveResult},
    types::SeqRef,
};

use super::{processor::SaveError, tracker::CompletionTracker};

#[derive(Debug)]
struct Results {
    seq: SequenceCounter,
    entities: Vec<ResultEntity>,
    key_mappings: Vec<KeyMapping>,
}

/// Counters and accumulated output of exactly one batch.
///
/// Every `process_batch` call builds its own; nothing is shared across calls.
#[derive(Debug)]
pub struct BatchState {
    naming: TypeNaming,
    envelope_seq: SeqRef,
    tracker: CompletionTracker,
    results: Mutex<Results>,
    first_error: Mutex<Option<SaveError>>,
}

impl BatchState {
    /// State for a batch of `target` entities. The envelope takes sequence 1.
    pub fn new(target: usize, naming: TypeNaming) -> Self {
        let mut seq = SequenceCounter::new();
        let envelope_seq = seq.next_ref();
        Self {
            naming,
            envelope_seq,
            tracker: CompletionTracker::new(target),
            results: Mutex::new(Results {
                seq,
                entities: Vec::new(),
                key_mappings: Vec::new(),
            }),
            first_error: Mutex::new(None),
        }
    }

    /// Completion tracker for this batch.
    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    /// Records one entity's outcome and counts it as processed.
    ///
    /// Results are appended before the count moves, so a `Done` tracker
    /// always sees the complete output.
    pub async fn complete(&self, record: &ChangeRecord, outcome: PersistResult<Outcome>) {
        match outcome {
            Ok(outcome) => {
                self.record(outcome).await;
                self.tracker.record_success();
            }
            Err(source) => {
                self.fail(SaveError::Store {
                    index: record.index,
                    logical_type: record.logical_type.clone(),
                    state: record.state,
                    source,
                })
                .await;
                self.tracker.record_failure();
            }
        }
    }

    /// Counts a failure for an entity whose mutation never reported.
    pub async fn fail_unreported(&self, err: SaveError) {
        self.fail(err).await;
        self.tracker.record_failure();
    }

    /// Serializes an outcome, assigning sequence refs in completion order.
    pub async fn record(&self, outcome: Outcome) {
        let mut results = self.results.lock().await;
        let Results {
            seq,
            entities,
            key_mappings,
        } = &mut *results;

        match outcome {
            Outcome::Created {
                logical_type,
                id,
                temp_id,
                wire,
            } => {
                let entity = result_entity(seq, &self.naming, &logical_type, id.clone(), wire);
                let mapping = key_mapping(seq, &self.naming, &logical_type, temp_id, id);
                debug!(
                    logical_type = %logical_type,
                    id = %mapping.real_value,
                    entity_seq = entity.seq,
                    mapping_seq = mapping.seq,
                    "created entity recorded"
                );
                entities.push(entity);
                key_mappings.push(mapping);
            }
            Outcome::Persisted {
                logical_type,
                id,
                fields,
            } => {
                let entity = result_entity(seq, &self.naming, &logical_type, id, fields);
                debug!(
                    logical_type = %logical_type,
                    id = %entity.id,
                    entity_seq = entity.seq,
                    "saved entity recorded"
                );
                entities.push(entity);
            }
        }
    }

    /// Keeps `err` if it is the first failure of the batch.
    pub async fn fail(&self, err: SaveError) {
        let mut slot = self.first_error.lock().await;
        if slot.is_none() {
            warn!(error = %err, "first failure in batch");
            *slot = Some(err);
        } else {
            debug!(error = %err, "additional failure in batch");
        }
    }

    /// Takes the first recorded failure, if any.
    pub async fn take_error(&self) -> Option<SaveError> {
        self.first_error.lock().await.take()
    }

    /// Drains the accumulated output into a [`SaveResult`].
    pub async fn finish(&self) -> SaveResult {
        let mut results = self.results.lock().await;
        SaveResult {
            seq: self.envelope_seq,
            type_ref: self.naming.result_type_ref("SaveResult"),
            entities: std::mem::take(&mut results.entities),
            key_mappings: std::mem::take(&mut results.key_mappings),
        }
    }
}
