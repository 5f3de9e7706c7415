//! Repository for the `data_classification_values` table.

use datalabel_core::types::DbId;
use sqlx::PgConnection;

use crate::models::classification_value::{ClassificationValue, ClassificationWrite};

/// Column list for data_classification_values queries.
const COLUMNS: &str = "id, data_id, classification_id, value, created_at, updated_at";

/// Provides batched lookups and keyed writes for classification values.
pub struct ClassificationValueRepo;

impl ClassificationValueRepo {
    /// List every classification value for the given data records.
    ///
    /// One query regardless of how many ids are requested.
    pub async fn find_by_data_ids(
        conn: &mut PgConnection,
        data_ids: &[DbId],
    ) -> Result<Vec<ClassificationValue>, sqlx::Error> {
        if data_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM data_classification_values
             WHERE data_id = ANY($1)
             ORDER BY data_id ASC, classification_id ASC, id ASC"
        );
        sqlx::query_as::<_, ClassificationValue>(&query)
            .bind(data_ids)
            .fetch_all(&mut *conn)
            .await
    }

    /// Insert a new classification value, returning the created row.
    pub async fn insert(
        conn: &mut PgConnection,
        write: &ClassificationWrite,
    ) -> Result<ClassificationValue, sqlx::Error> {
        let query = format!(
            "INSERT INTO data_classification_values (data_id, classification_id, value)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClassificationValue>(&query)
            .bind(write.data_id)
            .bind(write.classification_id)
            .bind(&write.value)
            .fetch_one(&mut *conn)
            .await
    }

    /// Replace the value of an existing row, keeping its identity.
    ///
    /// Returns `None` if no row with that id exists.
    pub async fn update_value(
        conn: &mut PgConnection,
        id: DbId,
        value: &serde_json::Value,
    ) -> Result<Option<ClassificationValue>, sqlx::Error> {
        let query = format!(
            "UPDATE data_classification_values SET
                value = $1,
                updated_at = now()
             WHERE id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClassificationValue>(&query)
            .bind(value)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }
}
