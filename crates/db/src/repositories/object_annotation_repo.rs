//! Repository for the `data_annotation_objects` table.

use datalabel_core::types::DbId;
use sqlx::PgConnection;

use crate::models::object_annotation::{ObjectAnnotation, SaveObjectAnnotation};

/// Column list for data_annotation_objects queries.
const COLUMNS: &str = "id, data_id, class_id, source_id, attributes, created_at, updated_at";

/// Provides batched lookups, inserts, updates and per-record deletion for
/// object annotations.
pub struct ObjectAnnotationRepo;

impl ObjectAnnotationRepo {
    /// List every object for the given data records, ordered by data id then id.
    pub async fn find_by_data_ids(
        conn: &mut PgConnection,
        data_ids: &[DbId],
    ) -> Result<Vec<ObjectAnnotation>, sqlx::Error> {
        if data_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM data_annotation_objects
             WHERE data_id = ANY($1)
             ORDER BY data_id ASC, id ASC"
        );
        sqlx::query_as::<_, ObjectAnnotation>(&query)
            .bind(data_ids)
            .fetch_all(&mut *conn)
            .await
    }

    /// Insert a new object, returning the created row with its assigned id.
    ///
    /// Any `id` on the input is ignored.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &SaveObjectAnnotation,
    ) -> Result<ObjectAnnotation, sqlx::Error> {
        let query = format!(
            "INSERT INTO data_annotation_objects (data_id, class_id, source_id, attributes)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ObjectAnnotation>(&query)
            .bind(input.data_id)
            .bind(input.class_id)
            .bind(input.source_id)
            .bind(&input.attributes)
            .fetch_one(&mut *conn)
            .await
    }

    /// Update object `id`, provided it belongs to `input.data_id`.
    ///
    /// Returns `None` if the object does not exist for that data record.
    pub async fn update(
        conn: &mut PgConnection,
        id: DbId,
        input: &SaveObjectAnnotation,
    ) -> Result<Option<ObjectAnnotation>, sqlx::Error> {
        let query = format!(
            "UPDATE data_annotation_objects SET
                class_id = $1,
                source_id = $2,
                attributes = $3,
                updated_at = now()
             WHERE id = $4 AND data_id = $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ObjectAnnotation>(&query)
            .bind(input.class_id)
            .bind(input.source_id)
            .bind(&input.attributes)
            .bind(id)
            .bind(input.data_id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Delete every object belonging to the given data records.
    /// Returns the number of rows removed.
    pub async fn delete_by_data_ids(
        conn: &mut PgConnection,
        data_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if data_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM data_annotation_objects WHERE data_id = ANY($1)")
            .bind(data_ids)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
