//! In-process implementation of the storage collaborator traits.
//!
//! Used by tests and by embedders that do not run Postgres. Transactional
//! sessions work on a private copy of the state and are published on commit
//! with optimistic version checking: a commit fails with
//! [`CoreError::Conflict`] if any other write landed after `begin()`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use datalabel_core::error::CoreError;
use datalabel_core::types::DbId;

use crate::error::StoreResult;
use crate::models::classification_value::{ClassificationValue, ClassificationWrite};
use crate::models::object_annotation::{ObjectAnnotation, SaveObjectAnnotation};
use crate::store::{ClassificationStore, ObjectPersistence, TransactionRunner};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    version: u64,
    last_classification_id: DbId,
    last_object_id: DbId,
    classifications: Vec<ClassificationValue>,
    objects: Vec<ObjectAnnotation>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_object_saves: AtomicBool,
    fail_commits: AtomicBool,
}

/// Shared in-memory annotation store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnnotationStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl InMemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following object save fail with an internal error.
    pub fn fail_object_saves(&self, fail: bool) {
        self.faults.fail_object_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every following commit fail as if a concurrent writer won.
    pub fn fail_commits(&self, fail: bool) {
        self.faults.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// All committed classification values, ordered by id.
    pub fn classifications(&self) -> StoreResult<Vec<ClassificationValue>> {
        let mut rows = lock(&self.state)?.classifications.clone();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    /// All committed objects, ordered by id.
    pub fn objects(&self) -> StoreResult<Vec<ObjectAnnotation>> {
        let mut rows = lock(&self.state)?.objects.clone();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }
}

fn lock(state: &Mutex<MemoryState>) -> StoreResult<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| CoreError::Internal("in-memory annotation store lock poisoned".into()).into())
}

/// A session over [`InMemoryAnnotationStore`].
///
/// Autocommit sessions act on the shared state directly; transactional
/// sessions stage their writes until committed.
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
    staged: Option<Staged>,
}

#[derive(Debug)]
struct Staged {
    base_version: u64,
    state: MemoryState,
}

impl MemorySession {
    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> StoreResult<T> {
        match &self.staged {
            Some(staged) => Ok(f(&staged.state)),
            None => {
                let guard = lock(&self.shared)?;
                Ok(f(&guard))
            }
        }
    }

    fn write<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        match &mut self.staged {
            Some(staged) => f(&mut staged.state),
            None => {
                let mut guard = lock(&self.shared)?;
                // Work on a copy so a failed autocommit write leaves nothing behind.
                let mut next = guard.clone();
                let value = f(&mut next)?;
                next.version += 1;
                *guard = next;
                Ok(value)
            }
        }
    }
}

#[async_trait]
impl ClassificationStore for MemorySession {
    async fn find_classifications(
        &mut self,
        data_ids: &[DbId],
    ) -> StoreResult<Vec<ClassificationValue>> {
        let wanted: HashSet<DbId> = data_ids.iter().copied().collect();
        let mut rows: Vec<ClassificationValue> = self.read(|state| {
            state
                .classifications
                .iter()
                .filter(|row| wanted.contains(&row.data_id))
                .cloned()
                .collect()
        })?;
        rows.sort_by_key(|row| (row.data_id, row.classification_id, row.id));
        Ok(rows)
    }

    async fn upsert_classifications(
        &mut self,
        writes: &[ClassificationWrite],
    ) -> StoreResult<()> {
        self.write(|state| {
            let now = Utc::now();
            for write in writes {
                match write.id {
                    Some(id) => {
                        let row = state
                            .classifications
                            .iter_mut()
                            .find(|row| row.id == id)
                            .ok_or(CoreError::NotFound {
                                entity: "classification value",
                                id,
                            })?;
                        row.value = write.value.clone();
                        row.updated_at = now;
                    }
                    None => {
                        let key = (write.data_id, write.classification_id);
                        if state
                            .classifications
                            .iter()
                            .any(|row| (row.data_id, row.classification_id) == key)
                        {
                            return Err(CoreError::Conflict(format!(
                                "classification {} already has a value for data {}",
                                write.classification_id, write.data_id
                            ))
                            .into());
                        }
                        state.last_classification_id += 1;
                        state.classifications.push(ClassificationValue {
                            id: state.last_classification_id,
                            data_id: write.data_id,
                            classification_id: write.classification_id,
                            value: write.value.clone(),
                            created_at: now,
                            updated_at: now,
                        });
                    }
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl ObjectPersistence for MemorySession {
    async fn find_objects(&mut self, data_ids: &[DbId]) -> StoreResult<Vec<ObjectAnnotation>> {
        let wanted: HashSet<DbId> = data_ids.iter().copied().collect();
        let mut rows: Vec<ObjectAnnotation> = self.read(|state| {
            state
                .objects
                .iter()
                .filter(|row| wanted.contains(&row.data_id))
                .cloned()
                .collect()
        })?;
        rows.sort_by_key(|row| (row.data_id, row.id));
        Ok(rows)
    }

    async fn save_objects(
        &mut self,
        objects: &[SaveObjectAnnotation],
        deleted_data_ids: &HashSet<DbId>,
    ) -> StoreResult<Vec<ObjectAnnotation>> {
        if self.faults.fail_object_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("object save failed".into()).into());
        }

        self.write(|state| {
            let now = Utc::now();
            state
                .objects
                .retain(|row| !deleted_data_ids.contains(&row.data_id));

            let mut saved = Vec::with_capacity(objects.len());
            for object in objects {
                let existing = match object.id {
                    Some(id) if !deleted_data_ids.contains(&object.data_id) => Some(
                        state
                            .objects
                            .iter_mut()
                            .find(|row| row.id == id && row.data_id == object.data_id)
                            .ok_or_else(|| {
                                CoreError::Validation(format!(
                                    "Object annotation {id} does not exist for data {}",
                                    object.data_id
                                ))
                            })?,
                    ),
                    _ => None,
                };

                let row = match existing {
                    Some(row) => {
                        row.class_id = object.class_id;
                        row.source_id = object.source_id;
                        row.attributes = object.attributes.clone();
                        row.updated_at = now;
                        row.clone()
                    }
                    None => {
                        state.last_object_id += 1;
                        let row = ObjectAnnotation {
                            id: state.last_object_id,
                            data_id: object.data_id,
                            class_id: object.class_id,
                            source_id: object.source_id,
                            attributes: object.attributes.clone(),
                            created_at: now,
                            updated_at: now,
                        };
                        state.objects.push(row.clone());
                        row
                    }
                };
                saved.push(row);
            }
            Ok(saved)
        })
    }
}

#[async_trait]
impl TransactionRunner for InMemoryAnnotationStore {
    type Session = MemorySession;

    async fn begin(&self) -> StoreResult<MemorySession> {
        let state = lock(&self.state)?.clone();
        Ok(MemorySession {
            shared: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            staged: Some(Staged {
                base_version: state.version,
                state,
            }),
        })
    }

    async fn connect(&self) -> StoreResult<MemorySession> {
        Ok(MemorySession {
            shared: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            staged: None,
        })
    }

    async fn commit(&self, session: MemorySession) -> StoreResult<()> {
        let Some(mut staged) = session.staged else {
            return Ok(());
        };
        if self.faults.fail_commits.load(Ordering::SeqCst) {
            return Err(CoreError::Conflict("commit rejected by store".into()).into());
        }

        let mut shared = lock(&self.state)?;
        if shared.version != staged.base_version {
            return Err(CoreError::Conflict(format!(
                "annotations changed since version {}",
                staged.base_version
            ))
            .into());
        }
        staged.state.version = staged.base_version + 1;
        *shared = staged.state;
        Ok(())
    }

    async fn rollback(&self, _session: MemorySession) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::error::StoreError;

    fn write(data_id: DbId, classification_id: DbId, value: &str) -> ClassificationWrite {
        ClassificationWrite {
            id: None,
            data_id,
            classification_id,
            value: json!(value),
        }
    }

    fn object(data_id: DbId, shape: &str) -> SaveObjectAnnotation {
        SaveObjectAnnotation {
            id: None,
            data_id,
            class_id: None,
            source_id: None,
            attributes: json!({ "shape": shape }),
        }
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.begin().await.unwrap();
        session
            .upsert_classifications(&[write(1, 10, "red")])
            .await
            .unwrap();

        assert!(store.classifications().unwrap().is_empty());
        store.commit(session).await.unwrap();
        assert_eq!(store.classifications().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.begin().await.unwrap();
        session.save_objects(&[object(1, "box")], &HashSet::new()).await.unwrap();
        store.rollback(session).await.unwrap();

        assert!(store.objects().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_after_concurrent_write_is_a_conflict() {
        let store = InMemoryAnnotationStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.upsert_classifications(&[write(1, 10, "a")]).await.unwrap();
        second.upsert_classifications(&[write(1, 10, "b")]).await.unwrap();

        store.commit(first).await.unwrap();
        let err = store.commit(second).await.unwrap_err();
        assert!(err.is_conflict());

        let rows = store.classifications().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, json!("a"));
    }

    #[tokio::test]
    async fn inserting_an_existing_key_is_a_conflict() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.connect().await.unwrap();
        session.upsert_classifications(&[write(1, 10, "a")]).await.unwrap();

        let err = session
            .upsert_classifications(&[write(1, 10, "b")])
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::Core(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn updating_an_unknown_row_is_not_found() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.connect().await.unwrap();
        let mut update = write(1, 10, "a");
        update.id = Some(99);

        let err = session.upsert_classifications(&[update]).await.unwrap_err();
        assert_matches!(
            err,
            StoreError::Core(CoreError::NotFound { id: 99, .. })
        );
    }

    #[tokio::test]
    async fn failed_autocommit_write_leaves_state_untouched() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.connect().await.unwrap();
        let mut stale = object(1, "ghost");
        stale.id = Some(7);

        let err = session
            .save_objects(&[object(1, "box"), stale], &HashSet::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.objects().unwrap().is_empty());
    }

    #[tokio::test]
    async fn object_update_must_match_its_data_record() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.connect().await.unwrap();
        let saved = session
            .save_objects(&[object(1, "box")], &HashSet::new())
            .await
            .unwrap();

        let mut moved = object(2, "box");
        moved.id = Some(saved[0].id);
        let err = session.save_objects(&[moved], &HashSet::new()).await.unwrap_err();
        assert_matches!(err, StoreError::Core(CoreError::Validation(msg)) if msg.contains("data 2"));
    }

    #[tokio::test]
    async fn autocommit_session_reads_committed_rows() {
        let store = InMemoryAnnotationStore::new();
        let mut writer = store.begin().await.unwrap();
        writer.upsert_classifications(&[write(3, 30, "blue")]).await.unwrap();
        writer.save_objects(&[object(3, "box")], &HashSet::new()).await.unwrap();
        store.commit(writer).await.unwrap();

        let mut reader = store.connect().await.unwrap();
        let classifications = reader.find_classifications(&[3]).await.unwrap();
        let objects = reader.find_objects(&[3, 4]).await.unwrap();
        assert_eq!(classifications.len(), 1);
        assert_eq!(classifications[0].value, json!("blue"));
        assert_eq!(objects.len(), 1);
        assert!(reader.find_objects(&[4]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finds_are_ordered_by_data_id_then_key() {
        let store = InMemoryAnnotationStore::new();
        let mut session = store.connect().await.unwrap();
        session
            .upsert_classifications(&[write(2, 20, "x"), write(1, 11, "y"), write(1, 10, "z")])
            .await
            .unwrap();

        let keys: Vec<(DbId, DbId)> = session
            .find_classifications(&[2, 1])
            .await
            .unwrap()
            .iter()
            .map(|row| (row.data_id, row.classification_id))
            .collect();
        assert_eq!(keys, vec![(1, 10), (1, 11), (2, 20)]);
    }
}
