//! Per-record aggregate returned by annotation reads.

use datalabel_core::types::DbId;
use serde::Serialize;

use crate::models::classification_value::ClassificationValue;
use crate::models::object_annotation::ObjectAnnotation;

/// Every annotation stored for one data record.
///
/// Built fresh for each query; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationResult {
    pub data_id: DbId,
    pub classification_values: Vec<ClassificationValue>,
    pub objects: Vec<ObjectAnnotation>,
}
