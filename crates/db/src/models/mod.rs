//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` save DTO for incoming batches

pub mod annotation_result;
pub mod classification_value;
pub mod object_annotation;
