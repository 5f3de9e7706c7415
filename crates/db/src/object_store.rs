//! Object annotation saves with per-record tombstoning.

use std::collections::HashSet;

use datalabel_core::annotation::{
    validate_deleted_data_ids, validate_id, validate_optional_id, validate_payload,
};
use datalabel_core::error::CoreError;
use datalabel_core::types::DbId;

use crate::error::StoreResult;
use crate::models::object_annotation::{ObjectAnnotation, SaveObjectAnnotation};
use crate::store::ObjectPersistence;

/// Persists object annotations and removes those of deleted records.
pub struct ObjectStore;

impl ObjectStore {
    /// Remove every object of the records in `deleted_data_ids`, then upsert
    /// `batch` by object id.
    ///
    /// Returns the saved rows in input order, including ids assigned to new
    /// objects.
    pub async fn save<S>(
        store: &mut S,
        batch: &[SaveObjectAnnotation],
        deleted_data_ids: &HashSet<DbId>,
    ) -> StoreResult<Vec<ObjectAnnotation>>
    where
        S: ObjectPersistence + ?Sized,
    {
        if batch.is_empty() && deleted_data_ids.is_empty() {
            return Ok(Vec::new());
        }
        validate_batch(batch)?;
        validate_deleted_data_ids(deleted_data_ids)?;

        let saved = store.save_objects(batch, deleted_data_ids).await?;

        tracing::debug!(
            incoming = batch.len(),
            saved = saved.len(),
            tombstoned_records = deleted_data_ids.len(),
            "Saved object annotations"
        );
        Ok(saved)
    }
}

/// Validate identifiers and payloads of an incoming object batch.
pub fn validate_batch(batch: &[SaveObjectAnnotation]) -> Result<(), CoreError> {
    batch.iter().try_for_each(|object| {
        validate_optional_id("id", object.id)?;
        validate_id("data_id", object.data_id)?;
        validate_optional_id("class_id", object.class_id)?;
        validate_optional_id("source_id", object.source_id)?;
        validate_payload("attributes", &object.attributes)
    })
}
