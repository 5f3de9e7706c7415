//! Annotation identity and validation helpers.
//!
//! Pure functions shared by the classification reconciler and the object
//! store. Nothing here touches storage.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Composite key of a classification value.
///
/// At most one stored classification value exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassificationKey {
    pub data_id: DbId,
    pub classification_id: DbId,
}

impl ClassificationKey {
    pub fn new(data_id: DbId, classification_id: DbId) -> Self {
        Self {
            data_id,
            classification_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that an identifier is a positive BIGSERIAL value.
pub fn validate_id(field: &str, id: DbId) -> Result<(), CoreError> {
    if id <= 0 {
        return Err(CoreError::Validation(format!(
            "{field} must be a positive integer, got {id}"
        )));
    }
    Ok(())
}

/// Validate an optional identifier; `None` is always accepted.
pub fn validate_optional_id(field: &str, id: Option<DbId>) -> Result<(), CoreError> {
    match id {
        Some(id) => validate_id(field, id),
        None => Ok(()),
    }
}

/// Validate that an opaque annotation payload is present.
///
/// Any JSON value other than `null` is accepted; the payload shape is owned
/// by the classification or ontology definition, not by this crate.
pub fn validate_payload(field: &str, payload: &serde_json::Value) -> Result<(), CoreError> {
    if payload.is_null() {
        return Err(CoreError::Validation(format!("{field} must not be null")));
    }
    Ok(())
}

/// Validate every data id flagged for object deletion.
pub fn validate_deleted_data_ids(ids: &HashSet<DbId>) -> Result<(), CoreError> {
    // Sorted so the reported id is stable across runs.
    let mut ids: Vec<DbId> = ids.iter().copied().collect();
    ids.sort_unstable();
    ids.into_iter()
        .try_for_each(|id| validate_id("deleted data_id", id))
}

// ---------------------------------------------------------------------------
// Id helpers
// ---------------------------------------------------------------------------

/// Deduplicate identifiers, keeping the position of each first occurrence.
pub fn distinct_ids<I>(ids: I) -> Vec<DbId>
where
    I: IntoIterator<Item = DbId>,
{
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
