//! PostgreSQL implementation of the storage collaborator traits.

use std::collections::HashSet;

use async_trait::async_trait;
use datalabel_core::error::CoreError;
use datalabel_core::types::DbId;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::StoreResult;
use crate::models::classification_value::{ClassificationValue, ClassificationWrite};
use crate::models::object_annotation::{ObjectAnnotation, SaveObjectAnnotation};
use crate::repositories::{ClassificationValueRepo, ObjectAnnotationRepo};
use crate::store::{ClassificationStore, ObjectPersistence, TransactionRunner};

/// Postgres-backed annotation store. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PgAnnotationStore {
    pool: PgPool,
}

impl PgAnnotationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A session over one Postgres connection.
pub struct PgSession {
    conn: SessionConn,
}

enum SessionConn {
    Transaction(Transaction<'static, Postgres>),
    Pooled(PoolConnection<Postgres>),
}

impl PgSession {
    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            SessionConn::Transaction(tx) => &mut **tx,
            SessionConn::Pooled(conn) => &mut **conn,
        }
    }
}

#[async_trait]
impl ClassificationStore for PgSession {
    async fn find_classifications(
        &mut self,
        data_ids: &[DbId],
    ) -> StoreResult<Vec<ClassificationValue>> {
        Ok(ClassificationValueRepo::find_by_data_ids(self.conn(), data_ids).await?)
    }

    async fn upsert_classifications(
        &mut self,
        writes: &[ClassificationWrite],
    ) -> StoreResult<()> {
        let conn = self.conn();
        for write in writes {
            match write.id {
                Some(id) => {
                    ClassificationValueRepo::update_value(conn, id, &write.value)
                        .await?
                        .ok_or(CoreError::NotFound {
                            entity: "classification value",
                            id,
                        })?;
                }
                None => {
                    ClassificationValueRepo::insert(conn, write).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectPersistence for PgSession {
    async fn find_objects(&mut self, data_ids: &[DbId]) -> StoreResult<Vec<ObjectAnnotation>> {
        Ok(ObjectAnnotationRepo::find_by_data_ids(self.conn(), data_ids).await?)
    }

    async fn save_objects(
        &mut self,
        objects: &[SaveObjectAnnotation],
        deleted_data_ids: &HashSet<DbId>,
    ) -> StoreResult<Vec<ObjectAnnotation>> {
        let conn = self.conn();

        let tombstoned: Vec<DbId> = deleted_data_ids.iter().copied().collect();
        let removed = ObjectAnnotationRepo::delete_by_data_ids(conn, &tombstoned).await?;

        let mut saved = Vec::with_capacity(objects.len());
        for object in objects {
            let row = match object.id {
                // Rows of tombstoned records are gone; their objects come back as new rows.
                Some(id) if !deleted_data_ids.contains(&object.data_id) => {
                    ObjectAnnotationRepo::update(conn, id, object)
                        .await?
                        .ok_or_else(|| {
                            CoreError::Validation(format!(
                                "Object annotation {id} does not exist for data {}",
                                object.data_id
                            ))
                        })?
                }
                _ => ObjectAnnotationRepo::insert(conn, object).await?,
            };
            saved.push(row);
        }

        tracing::debug!(removed, saved = saved.len(), "Persisted object annotations");
        Ok(saved)
    }
}

#[async_trait]
impl TransactionRunner for PgAnnotationStore {
    type Session = PgSession;

    async fn begin(&self) -> StoreResult<PgSession> {
        let tx = self.pool.begin().await?;
        Ok(PgSession {
            conn: SessionConn::Transaction(tx),
        })
    }

    async fn connect(&self) -> StoreResult<PgSession> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession {
            conn: SessionConn::Pooled(conn),
        })
    }

    async fn commit(&self, session: PgSession) -> StoreResult<()> {
        if let SessionConn::Transaction(tx) = session.conn {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&self, session: PgSession) -> StoreResult<()> {
        if let SessionConn::Transaction(tx) = session.conn {
            tx.rollback().await?;
        }
        Ok(())
    }
}
