//! Atomic annotation saves and per-record annotation reads.
//!
//! A save spans both annotation collections. Classification values and
//! object annotations submitted together describe one coherent annotation
//! state for their records, so they commit together or not at all.

use std::collections::{HashMap, HashSet};

use datalabel_core::annotation::distinct_ids;
use datalabel_core::types::DbId;

use crate::error::{StoreError, StoreResult};
use crate::models::annotation_result::AnnotationResult;
use crate::models::classification_value::{ClassificationValue, SaveClassificationValue};
use crate::models::object_annotation::{ObjectAnnotation, SaveObjectAnnotation};
use crate::object_store::ObjectStore;
use crate::reconciler::ClassificationReconciler;
use crate::store::{run_atomic, ClassificationStore, ObjectPersistence, TransactionRunner};

/// Entry point for saving and loading data annotations.
///
/// Performs no locking of its own: concurrent saves on the same record rely
/// on the store's isolation, and a rejected commit surfaces as an error for
/// which [`StoreError::is_conflict`] is true.
#[derive(Debug, Clone)]
pub struct AnnotationCoordinator<R> {
    runner: R,
}

impl<R> AnnotationCoordinator<R>
where
    R: TransactionRunner,
{
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Save classification values and objects in one unit of work.
    ///
    /// Objects of every record in `deleted_data_ids` are removed first.
    /// Returns the saved objects in input order, with the ids assigned to new
    /// ones. On error nothing from this call is committed.
    pub async fn save(
        &self,
        classifications: Vec<SaveClassificationValue>,
        objects: Vec<SaveObjectAnnotation>,
        deleted_data_ids: HashSet<DbId>,
    ) -> StoreResult<Vec<ObjectAnnotation>> {
        tracing::debug!(
            classifications = classifications.len(),
            objects = objects.len(),
            deleted_records = deleted_data_ids.len(),
            "Saving data annotations"
        );
        let tombstoned = deleted_data_ids.len();

        let outcome = run_atomic(&self.runner, move |session| {
            Box::pin(async move {
                let writes =
                    ClassificationReconciler::save(&mut *session, &classifications).await?;
                let saved = ObjectStore::save(&mut *session, &objects, &deleted_data_ids).await?;
                Ok::<_, StoreError>((writes.len(), saved))
            })
        })
        .await;

        match outcome {
            Ok((classification_writes, saved)) => {
                tracing::info!(
                    classification_writes,
                    objects_saved = saved.len(),
                    tombstoned_records = tombstoned,
                    "Data annotations saved"
                );
                Ok(saved)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    conflict = err.is_conflict(),
                    "Data annotation save rolled back"
                );
                Err(err)
            }
        }
    }

    /// Load the annotations of each requested record.
    ///
    /// Returns one result per entry of `data_ids`, in the same order and
    /// including repeats. Records without annotations get empty sequences.
    /// Both collections are fetched with one batched read each; the two reads
    /// are not taken from a common snapshot.
    pub async fn find_by_data_ids(&self, data_ids: &[DbId]) -> StoreResult<Vec<AnnotationResult>> {
        if data_ids.is_empty() {
            return Ok(Vec::new());
        }
        let distinct = distinct_ids(data_ids.iter().copied());
        tracing::debug!(
            requested = data_ids.len(),
            distinct = distinct.len(),
            "Loading data annotations"
        );

        let mut session = self.runner.connect().await?;
        let classifications = session.find_classifications(&distinct).await?;
        let objects = session.find_objects(&distinct).await?;

        Ok(assemble_results(data_ids, classifications, objects))
    }
}

/// Join prefetched classification values and objects per requested record.
///
/// Rows whose data id was not requested are dropped.
pub fn assemble_results(
    data_ids: &[DbId],
    classifications: Vec<ClassificationValue>,
    objects: Vec<ObjectAnnotation>,
) -> Vec<AnnotationResult> {
    let classifications = group_by_data_id(classifications, |row| row.data_id);
    let objects = group_by_data_id(objects, |row| row.data_id);

    data_ids
        .iter()
        .map(|&data_id| AnnotationResult {
            data_id,
            classification_values: classifications.get(&data_id).cloned().unwrap_or_default(),
            objects: objects.get(&data_id).cloned().unwrap_or_default(),
        })
        .collect()
}

fn group_by_data_id<T, F>(rows: Vec<T>, data_id: F) -> HashMap<DbId, Vec<T>>
where
    F: Fn(&T) -> DbId,
{
    let mut groups: HashMap<DbId, Vec<T>> = HashMap::new();
    for row in rows {
        groups.entry(data_id(&row)).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn value(id: DbId, data_id: DbId, classification_id: DbId) -> ClassificationValue {
        let now = Utc::now();
        ClassificationValue {
            id,
            data_id,
            classification_id,
            value: json!("v"),
            created_at: now,
            updated_at: now,
        }
    }

    fn object(id: DbId, data_id: DbId) -> ObjectAnnotation {
        let now = Utc::now();
        ObjectAnnotation {
            id,
            data_id,
            class_id: None,
            source_id: None,
            attributes: json!({ "type": "polygon" }),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn results_follow_requested_order() {
        let results = assemble_results(
            &[3, 1, 2],
            vec![value(1, 1, 10), value(2, 2, 10), value(3, 3, 10)],
            vec![object(1, 2)],
        );
        let ids: Vec<DbId> = results.iter().map(|r| r.data_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(results[0].classification_values[0].id, 3);
        assert!(results[0].objects.is_empty());
        assert_eq!(results[2].objects[0].id, 1);
    }

    #[test]
    fn unknown_ids_get_empty_sequences() {
        let results = assemble_results(&[42], Vec::new(), Vec::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].data_id, 42);
        assert!(results[0].classification_values.is_empty());
        assert!(results[0].objects.is_empty());
    }

    #[test]
    fn repeated_ids_share_the_same_rows() {
        let results = assemble_results(&[1, 1], vec![value(5, 1, 10)], vec![object(6, 1)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn rows_keep_store_order_within_a_record() {
        let results = assemble_results(
            &[1],
            vec![value(9, 1, 10), value(4, 1, 11)],
            vec![object(2, 1), object(8, 1)],
        );
        let classification_ids: Vec<DbId> = results[0]
            .classification_values
            .iter()
            .map(|v| v.classification_id)
            .collect();
        assert_eq!(classification_ids, vec![10, 11]);
        let object_ids: Vec<DbId> = results[0].objects.iter().map(|o| o.id).collect();
        assert_eq!(object_ids, vec![2, 8]);
    }

    #[test]
    fn unrequested_rows_are_dropped() {
        let results = assemble_results(&[1], vec![value(1, 2, 10)], vec![object(1, 3)]);
        assert!(results[0].classification_values.is_empty());
        assert!(results[0].objects.is_empty());
    }
}
