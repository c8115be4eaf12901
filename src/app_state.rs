use std::sync::Arc;

use crate::db::StatusStore;
use crate::services::{
    query::QueryService, queue::JobQueue, storage::BlobStore, submission::SubmissionService,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub submission: SubmissionService,
    pub query: QueryService,
    pub status: Arc<dyn StatusStore>,
    pub queue: Arc<dyn JobQueue>,
}

impl AppState {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        status: Arc<dyn StatusStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            submission: SubmissionService::new(blobs, status.clone(), queue.clone()),
            query: QueryService::new(status.clone()),
            status,
            queue,
        }
    }
}
