use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::error::PipelineError;
use crate::models::job::JobSummary;
use crate::models::upload::{UploadRequest, UploadResponse};

/// POST /upload — accept a base64 photo and queue it for classification.
pub async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, PipelineError> {
    let response = state.submission.submit_encoded(&request).await?;
    Ok(Json(response))
}

/// GET /list — every job with its current state and result.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<JobSummary>>, PipelineError> {
    let jobs = state.query.list_jobs().await?;
    Ok(Json(jobs))
}
