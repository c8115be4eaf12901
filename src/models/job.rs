use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a classification job. Only ever moves `Queued -> Finished`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingState {
    Queued,
    Finished,
}

impl ProcessingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingState::Finished)
    }
}

/// The persisted status row for one uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub request_id: Uuid,
    pub processing_state: ProcessingState,
    /// Meaningful only once `processing_state` is `Finished`.
    pub result: bool,
    pub file_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Values needed to create the initial `Queued` row.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub request_id: Uuid,
    pub file_name: Option<String>,
}

/// Projection returned by `GET /list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub state: ProcessingState,
    pub result: bool,
}

impl From<JobRecord> for JobSummary {
    fn from(record: JobRecord) -> Self {
        Self {
            request_id: record.request_id,
            timestamp: record.timestamp,
            state: record.processing_state,
            result: record.result,
        }
    }
}

/// Queue envelope. `req` carries the request id and is the only field the worker reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobMessage {
    pub req: String,
}

impl JobMessage {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            req: request_id.to_string(),
        }
    }
}

/// One (label, confidence) pair returned by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Blob key for an uploaded image. The `.png` suffix is a naming convention only.
pub fn blob_key(request_id: Uuid) -> String {
    format!("{}.png", request_id)
}
