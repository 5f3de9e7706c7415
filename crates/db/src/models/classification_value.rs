//! Classification value model and DTOs.

use datalabel_core::annotation::ClassificationKey;
use datalabel_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `data_classification_values` table.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ClassificationValue {
    pub id: DbId,
    pub data_id: DbId,
    pub classification_id: DbId,
    pub value: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ClassificationValue {
    pub fn key(&self) -> ClassificationKey {
        ClassificationKey::new(self.data_id, self.classification_id)
    }
}

/// DTO for one incoming classification value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveClassificationValue {
    pub data_id: DbId,
    pub classification_id: DbId,
    pub value: serde_json::Value,
}

impl SaveClassificationValue {
    pub fn key(&self) -> ClassificationKey {
        ClassificationKey::new(self.data_id, self.classification_id)
    }
}

/// A reconciled write: update row `id` in place, or insert when `id` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationWrite {
    pub id: Option<DbId>,
    pub data_id: DbId,
    pub classification_id: DbId,
    pub value: serde_json::Value,
}
