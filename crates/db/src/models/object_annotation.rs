//! Object annotation model and DTOs.

use datalabel_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `data_annotation_objects` table.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ObjectAnnotation {
    pub id: DbId,
    pub data_id: DbId,
    /// Ontology class the shape was drawn for.
    pub class_id: Option<DbId>,
    /// Model run or import that produced the shape; `None` for manual work.
    pub source_id: Option<DbId>,
    /// Geometry and attribute payload.
    pub attributes: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for one incoming object annotation.
///
/// A present `id` updates that object; `None` inserts a new one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveObjectAnnotation {
    pub id: Option<DbId>,
    pub data_id: DbId,
    pub class_id: Option<DbId>,
    pub source_id: Option<DbId>,
    pub attributes: serde_json::Value,
}
