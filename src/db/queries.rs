use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::{StatusStore, StatusStoreError};
use crate::models::job::{JobRecord, NewJob, ProcessingState};

/// Status store backed by the PostgreSQL `jobs` table.
#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<JobRecord, StatusStoreError> {
    let state_str: String = row.try_get("processing_state")?;
    let processing_state = ProcessingState::from_str(&state_str)
        .map_err(|_| StatusStoreError::Corrupt(format!("unknown processing_state {state_str:?}")))?;

    Ok(JobRecord {
        request_id: row.try_get("request_id")?,
        processing_state,
        result: row.try_get("result")?,
        file_name: row.try_get("file_name")?,
        timestamp: row.try_get("updated_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl StatusStore for PgStatusStore {
    /// Insert a new queued job
    async fn insert(&self, job: &NewJob) -> Result<JobRecord, StatusStoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO jobs (request_id, processing_state, result, file_name)
            VALUES ($1, 'QUEUED', FALSE, $2)
            RETURNING request_id, processing_state, result, file_name, updated_at
            "#,
        )
        .bind(job.request_id)
        .bind(job.file_name.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StatusStoreError::Duplicate(job.request_id)
            } else {
                StatusStoreError::Database(e)
            }
        })?;

        record_from_row(&row)
    }

    /// Merge the terminal state; file_name is left as inserted
    async fn upsert_finished(
        &self,
        request_id: Uuid,
        result: bool,
    ) -> Result<(), StatusStoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (request_id, processing_state, result)
            VALUES ($1, 'FINISHED', $2)
            ON CONFLICT (request_id) DO UPDATE
            SET processing_state = 'FINISHED',
                result = EXCLUDED.result,
                updated_at = NOW()
            "#,
        )
        .bind(request_id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<JobRecord>, StatusStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, processing_state, result, file_name, updated_at
            FROM jobs
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<JobRecord>, StatusStoreError> {
        let row = sqlx::query(
            r#"
            SELECT request_id, processing_state, result, file_name, updated_at
            FROM jobs
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn health_check(&self) -> Result<(), StatusStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
