//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&mut PgConnection` as the first argument, so the same
//! queries run inside a transaction or on a plain pooled connection.

pub mod classification_value_repo;
pub mod object_annotation_repo;

pub use classification_value_repo::ClassificationValueRepo;
pub use object_annotation_repo::ObjectAnnotationRepo;
