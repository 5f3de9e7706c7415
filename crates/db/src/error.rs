use datalabel_core::error::CoreError;

/// Error returned by the annotation stores and components.
///
/// Wraps [`CoreError`] for domain errors and `sqlx::Error` for storage
/// failures. Neither is translated on its way up to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level error from `datalabel_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience alias for store return values.
pub type StoreResult<T> = Result<T, StoreError>;

/// PostgreSQL SQLSTATE codes that mean the unit of work lost a race.
///
/// - `40001` serialization failure
/// - `40P01` deadlock detected
/// - `23505` unique violation (a concurrent insert of the same key won)
const CONFLICT_SQLSTATES: &[&str] = &["40001", "40P01", "23505"];

impl StoreError {
    /// Whether the failure was a rejected commit caused by a concurrent write.
    ///
    /// Callers may retry the whole save when this returns true.
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Core(CoreError::Conflict(_)) => true,
            StoreError::Core(_) => false,
            StoreError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .is_some_and(|code| CONFLICT_SQLSTATES.iter().any(|state| *state == code)),
            StoreError::Database(_) => false,
        }
    }

    /// Whether the failure was caused by invalid input.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::Validation(_)))
    }
}
