use crate::db::StatusStoreError;
use crate::services::classifier::ClassifierError;
use crate::services::queue::QueueError;
use crate::services::storage::StorageError;

/// Failures surfaced by the submission, worker and query paths.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Blob store error: {0}")]
    Blob(#[from] StorageError),

    #[error("Status store error: {0}")]
    Status(#[from] StatusStoreError),

    #[error("Job queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Classification service error: {0}")]
    Classification(#[from] ClassifierError),
}

impl PipelineError {
    /// Whether a later attempt could succeed. Everything but bad input is worth retrying.
    pub fn is_transient(&self) -> bool {
        !matches!(self, PipelineError::MalformedInput(_))
    }
}
