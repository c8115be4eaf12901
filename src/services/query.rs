use std::sync::Arc;

use crate::db::StatusStore;
use crate::error::PipelineError;
use crate::models::job::JobSummary;

/// Read side of the pipeline.
#[derive(Clone)]
pub struct QueryService {
    status: Arc<dyn StatusStore>,
}

impl QueryService {
    pub fn new(status: Arc<dyn StatusStore>) -> Self {
        Self { status }
    }

    /// All job records projected to summaries, in store order.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, PipelineError> {
        let records = self.status.scan_all().await?;
        Ok(records.into_iter().map(JobSummary::from).collect())
    }
}
