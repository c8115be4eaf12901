use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /upload`.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    /// Base64-encoded image bytes.
    #[garde(length(min = 1))]
    pub photo: String,

    /// Original file name, kept for bookkeeping only.
    #[garde(length(min = 1, max = 255))]
    pub name: String,
}

/// Response after an image has been accepted for classification.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub request_id: Uuid,
}
