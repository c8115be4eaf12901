use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::{StatusStore, StatusStoreError};
use crate::models::job::{JobRecord, NewJob, ProcessingState};

/// In-process status store used by tests.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<Uuid, JobRecord>>,
    fail_inserts: AtomicBool,
    fail_upserts: AtomicBool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert` fail as if the table were unreachable.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `upsert_finished` fail the same way.
    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, JobRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn insert(&self, job: &NewJob) -> Result<JobRecord, StatusStoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StatusStoreError::Unavailable("status table offline".to_string()));
        }

        let mut records = self.lock();
        if records.contains_key(&job.request_id) {
            return Err(StatusStoreError::Duplicate(job.request_id));
        }

        let record = JobRecord {
            request_id: job.request_id,
            processing_state: ProcessingState::Queued,
            result: false,
            file_name: job.file_name.clone(),
            timestamp: Utc::now(),
        };
        records.insert(job.request_id, record.clone());
        Ok(record)
    }

    async fn upsert_finished(
        &self,
        request_id: Uuid,
        result: bool,
    ) -> Result<(), StatusStoreError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StatusStoreError::Unavailable("status table offline".to_string()));
        }

        let mut records = self.lock();
        let record = records.entry(request_id).or_insert_with(|| JobRecord {
            request_id,
            processing_state: ProcessingState::Finished,
            result,
            file_name: None,
            timestamp: Utc::now(),
        });
        record.processing_state = ProcessingState::Finished;
        record.result = result;
        record.timestamp = Utc::now();
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<JobRecord>, StatusStoreError> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<JobRecord>, StatusStoreError> {
        Ok(self.lock().get(&request_id).cloned())
    }
}
