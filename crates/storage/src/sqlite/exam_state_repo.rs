use async_trait::async_trait;
use chrono::Utc;
use exam_core::model::ExamKey;
use sqlx::Row;
use tracing::debug;

use super::SqliteRepository;
use crate::repository::{ExamStateRepository, PersistedRecord, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ExamStateRepository for SqliteRepository {
    async fn load_state(&self, key: &ExamKey) -> Result<Option<PersistedRecord>, StorageError> {
        let row = sqlx::query("SELECT payload FROM exam_states WHERE exam_key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        PersistedRecord::from_json(&payload).map(Some)
    }

    async fn save_state(
        &self,
        key: &ExamKey,
        record: &PersistedRecord,
    ) -> Result<(), StorageError> {
        let payload = record.to_json()?;
        sqlx::query(
            r"
            INSERT INTO exam_states (exam_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(exam_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key.as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        debug!(exam_key = %key, "upserted exam state row");
        Ok(())
    }

    async fn delete_state(&self, key: &ExamKey) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM exam_states WHERE exam_key = ?1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        debug!(exam_key = %key, removed = result.rows_affected(), "deleted exam state row");
        Ok(())
    }
}
