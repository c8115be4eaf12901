use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::{JobRecord, NewJob};

pub mod memory;
pub mod queries;

pub use memory::MemoryStatusStore;
pub use queries::PgStatusStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Key-value table of job records keyed by request id.
///
/// Rows are created once with `insert` and moved to their terminal state with
/// `upsert_finished`, which may be applied any number of times.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Create the initial `QUEUED` row. Fails if the id already exists.
    async fn insert(&self, job: &NewJob) -> Result<JobRecord, StatusStoreError>;

    /// Merge `FINISHED` and `result` into the row for `request_id`.
    async fn upsert_finished(&self, request_id: Uuid, result: bool)
        -> Result<(), StatusStoreError>;

    /// Every record, in store-defined order.
    async fn scan_all(&self) -> Result<Vec<JobRecord>, StatusStoreError>;

    async fn get(&self, request_id: Uuid) -> Result<Option<JobRecord>, StatusStoreError>;

    async fn health_check(&self) -> Result<(), StatusStoreError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job record already exists: {0}")]
    Duplicate(Uuid),

    #[error("Corrupt job record: {0}")]
    Corrupt(String),

    #[error("Status store unavailable: {0}")]
    Unavailable(String),
}
