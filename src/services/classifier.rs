use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::job::Detection;

/// Image classification capability: given a readable image URL, return what it depicts.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image_url: &str) -> Result<Vec<Detection>, ClassifierError>;
}

/// Client for the Computer Vision object detection API.
pub struct ComputerVisionClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    objects: Option<Vec<DetectedObject>>,
}

#[derive(Deserialize)]
struct DetectedObject {
    object: Option<String>,
    confidence: Option<f64>,
}

impl ComputerVisionClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, ClassifierError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClassifierError::Http)?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn detect_url(&self) -> String {
        format!("{}/vision/v3.2/detect", self.endpoint)
    }
}

#[async_trait]
impl Classifier for ComputerVisionClient {
    async fn classify(&self, image_url: &str) -> Result<Vec<Detection>, ClassifierError> {
        let response = self
            .http
            .post(self.detect_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&DetectRequest { url: image_url })
            .send()
            .await
            .map_err(ClassifierError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(ClassifierError::Http)?;
        parse_detect_response(&body)
    }
}

/// Objects without a label or confidence cannot qualify and are dropped.
fn parse_detect_response(body: &[u8]) -> Result<Vec<Detection>, ClassifierError> {
    let parsed: DetectResponse = serde_json::from_slice(body)?;

    Ok(parsed
        .objects
        .unwrap_or_default()
        .into_iter()
        .filter_map(|o| match (o.object, o.confidence) {
            (Some(label), Some(confidence)) => Some(Detection { label, confidence }),
            _ => None,
        })
        .collect())
}

/// Deterministic classifier for tests and local runs.
///
/// Scripted outcomes are returned in order, one per call; once exhausted every
/// call returns the default outcome.
pub struct StubClassifier {
    script: Mutex<VecDeque<Result<Vec<Detection>, String>>>,
    default: Result<Vec<Detection>, String>,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn fixed(detections: Vec<Detection>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Ok(detections),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a one-off failure ahead of the default outcome.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Queue a one-off result ahead of the default outcome.
    pub fn then_return(self, detections: Vec<Detection>) -> Self {
        self.push(Ok(detections));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, outcome: Result<Vec<Detection>, String>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _image_url: &str) -> Result<Vec<Detection>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        next.unwrap_or_else(|| self.default.clone())
            .map_err(ClassifierError::Unavailable)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier returned status {0}")]
    Status(u16),

    #[error("Failed to parse classifier response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}
