pub mod annotation;
pub mod error;
pub mod types;
