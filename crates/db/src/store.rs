//! Storage collaborator traits and the atomic unit-of-work boundary.
//!
//! The reconciler, object store and coordinator are written against these
//! traits. [`crate::postgres`] implements them over sqlx and
//! [`crate::memory`] implements them in process.

use std::collections::HashSet;

use async_trait::async_trait;
use datalabel_core::types::DbId;
use futures::future::BoxFuture;

use crate::error::StoreResult;
use crate::models::classification_value::{ClassificationValue, ClassificationWrite};
use crate::models::object_annotation::{ObjectAnnotation, SaveObjectAnnotation};

/// Batched access to stored classification values.
#[async_trait]
pub trait ClassificationStore: Send {
    /// Every stored value whose data id is in `data_ids`.
    async fn find_classifications(
        &mut self,
        data_ids: &[DbId],
    ) -> StoreResult<Vec<ClassificationValue>>;

    /// Apply reconciled writes: rows with an id are updated in place, the
    /// rest are inserted.
    async fn upsert_classifications(&mut self, writes: &[ClassificationWrite])
        -> StoreResult<()>;
}

/// Batched access to stored object annotations.
#[async_trait]
pub trait ObjectPersistence: Send {
    /// Every stored object whose data id is in `data_ids`.
    async fn find_objects(&mut self, data_ids: &[DbId]) -> StoreResult<Vec<ObjectAnnotation>>;

    /// Remove the objects of every record in `deleted_data_ids`, then upsert
    /// `objects` by object id. Returns the saved rows in input order.
    async fn save_objects(
        &mut self,
        objects: &[SaveObjectAnnotation],
        deleted_data_ids: &HashSet<DbId>,
    ) -> StoreResult<Vec<ObjectAnnotation>>;
}

/// Opens sessions over both annotation collections and decides their fate.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    /// A session able to read and write both collections.
    type Session: ClassificationStore + ObjectPersistence + Send;

    /// Open a session whose writes become visible only on [`commit`](Self::commit).
    async fn begin(&self) -> StoreResult<Self::Session>;

    /// Open an autocommit session, used for reads.
    async fn connect(&self) -> StoreResult<Self::Session>;

    /// Make every write of the session durable and visible together.
    async fn commit(&self, session: Self::Session) -> StoreResult<()>;

    /// Discard every write of the session.
    async fn rollback(&self, session: Self::Session) -> StoreResult<()>;
}

/// Run `work` inside one transactional session.
///
/// Commits when `work` succeeds and rolls back when it fails. The error from
/// `work` is returned unchanged; a rollback failure is only logged.
pub async fn run_atomic<R, T, F>(runner: &R, work: F) -> StoreResult<T>
where
    R: TransactionRunner + ?Sized,
    F: for<'t> FnOnce(&'t mut R::Session) -> BoxFuture<'t, StoreResult<T>> + Send,
{
    let mut session = runner.begin().await?;
    let outcome = work(&mut session).await;
    match outcome {
        Ok(value) => {
            runner.commit(session).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = runner.rollback(session).await {
                tracing::warn!(
                    error = %rollback_err,
                    original_error = %err,
                    "Rollback failed after aborted unit of work"
                );
            }
            Err(err)
        }
    }
}
