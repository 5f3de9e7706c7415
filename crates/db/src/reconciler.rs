//! Keyed upsert of classification values.
//!
//! At most one value is stored per (data record, classification). An
//! incoming value either updates the stored row for its key in place or is
//! inserted as a new row. Stored values are fetched once per batch and
//! matched in memory.

use std::collections::HashMap;

use datalabel_core::annotation::{distinct_ids, validate_id, validate_payload, ClassificationKey};
use datalabel_core::error::CoreError;
use datalabel_core::types::DbId;

use crate::error::StoreResult;
use crate::models::classification_value::{
    ClassificationValue, ClassificationWrite, SaveClassificationValue,
};
use crate::store::ClassificationStore;

/// Reconciles incoming classification values against stored ones.
pub struct ClassificationReconciler;

impl ClassificationReconciler {
    /// Upsert every value in `batch`, keyed on (data_id, classification_id).
    ///
    /// Returns the writes that were applied. Nothing is ever deleted here.
    pub async fn save<S>(
        store: &mut S,
        batch: &[SaveClassificationValue],
    ) -> StoreResult<Vec<ClassificationWrite>>
    where
        S: ClassificationStore + ?Sized,
    {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        validate_batch(batch)?;

        let data_ids = distinct_ids(batch.iter().map(|value| value.data_id));
        let existing = store.find_classifications(&data_ids).await?;
        let writes = plan_writes(&existing, batch);

        store.upsert_classifications(&writes).await?;

        tracing::debug!(
            incoming = batch.len(),
            updated = writes.iter().filter(|w| w.id.is_some()).count(),
            inserted = writes.iter().filter(|w| w.id.is_none()).count(),
            "Reconciled classification values"
        );
        Ok(writes)
    }
}

/// Validate identifiers and payloads of an incoming batch.
pub fn validate_batch(batch: &[SaveClassificationValue]) -> Result<(), CoreError> {
    batch.iter().try_for_each(|value| {
        validate_id("data_id", value.data_id)?;
        validate_id("classification_id", value.classification_id)?;
        validate_payload("value", &value.value)
    })
}

/// Decide, per incoming value, whether to update a stored row or insert.
///
/// Duplicate keys in `incoming` collapse into one write: the last value wins
/// and the write keeps the position of the key's first occurrence.
pub fn plan_writes(
    existing: &[ClassificationValue],
    incoming: &[SaveClassificationValue],
) -> Vec<ClassificationWrite> {
    let mut stored: HashMap<ClassificationKey, DbId> = HashMap::with_capacity(existing.len());
    for row in existing {
        stored.entry(row.key()).or_insert(row.id);
    }

    let mut planned: HashMap<ClassificationKey, usize> = HashMap::with_capacity(incoming.len());
    let mut writes: Vec<ClassificationWrite> = Vec::with_capacity(incoming.len());
    for value in incoming {
        let key = value.key();
        match planned.get(&key) {
            Some(&index) => writes[index].value = value.value.clone(),
            None => {
                planned.insert(key, writes.len());
                writes.push(ClassificationWrite {
                    id: stored.get(&key).copied(),
                    data_id: value.data_id,
                    classification_id: value.classification_id,
                    value: value.value.clone(),
                });
            }
        }
    }
    writes
}
