use base64::Engine;
use garde::Validate;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::StatusStore;
use crate::error::PipelineError;
use crate::models::job::{blob_key, JobMessage, NewJob};
use crate::models::upload::{UploadRequest, UploadResponse};
use crate::services::queue::JobQueue;
use crate::services::storage::BlobStore;

/// Accepts uploads and hands them to the worker through the queue.
#[derive(Clone)]
pub struct SubmissionService {
    blobs: Arc<dyn BlobStore>,
    status: Arc<dyn StatusStore>,
    queue: Arc<dyn JobQueue>,
}

impl SubmissionService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        status: Arc<dyn StatusStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            blobs,
            status,
            queue,
        }
    }

    /// Validate and decode an upload body, then submit it.
    ///
    /// Malformed bodies are rejected here, before anything is written.
    pub async fn submit_encoded(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadResponse, PipelineError> {
        request
            .validate()
            .map_err(|e| PipelineError::MalformedInput(e.to_string()))?;

        let photo = base64::engine::general_purpose::STANDARD
            .decode(request.photo.trim())
            .map_err(|e| PipelineError::MalformedInput(format!("photo is not valid base64: {e}")))?;

        if photo.is_empty() {
            return Err(PipelineError::MalformedInput("photo is empty".to_string()));
        }

        self.submit(&photo, &request.name).await
    }

    /// Store the image, create the `QUEUED` record, then enqueue the job.
    ///
    /// The order matters: a failed blob write leaves nothing behind, and the worker
    /// never sees a message without a status row. A blob orphaned by a failed row
    /// insert is left for external cleanup.
    pub async fn submit(
        &self,
        photo: &[u8],
        file_name: &str,
    ) -> Result<UploadResponse, PipelineError> {
        let request_id = Uuid::new_v4();
        let key = blob_key(request_id);

        self.blobs.put(&key, photo, "image/png").await.map_err(|e| {
            tracing::error!(request_id = %request_id, error = %e, "Blob write failed");
            e
        })?;

        let job = NewJob {
            request_id,
            file_name: Some(file_name.to_string()),
        };
        self.status.insert(&job).await.map_err(|e| {
            tracing::error!(
                request_id = %request_id,
                blob_key = %key,
                error = %e,
                "Status insert failed, blob left orphaned"
            );
            e
        })?;

        self.queue
            .publish(&JobMessage::new(request_id))
            .await
            .map_err(|e| {
                tracing::error!(request_id = %request_id, error = %e, "Queue publish failed");
                e
            })?;

        metrics::counter!("jobs_submitted_total").increment(1);
        tracing::info!(
            request_id = %request_id,
            file_name = %file_name,
            bytes = photo.len(),
            "Image queued for classification"
        );

        Ok(UploadResponse { request_id })
    }
}
