//! Shared test harness: the whole pipeline wired to in-memory adapters

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use base64::Engine;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use hotdog_detect::app_state::AppState;
use hotdog_detect::db::MemoryStatusStore;
use hotdog_detect::models::job::Detection;
use hotdog_detect::services::{
    classifier::StubClassifier, query::QueryService, queue::MemoryJobQueue,
    storage::MemoryBlobStore, submission::SubmissionService, verdict::VerdictPolicy,
    worker::Worker,
};

/// Smallest valid PNG (1x1 transparent pixel).
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub struct Harness {
    pub blobs: Arc<MemoryBlobStore>,
    pub status: Arc<MemoryStatusStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub classifier: Arc<StubClassifier>,
    pub submission: SubmissionService,
    pub query: QueryService,
    pub worker: Worker,
}

impl Harness {
    /// Zero visibility timeout: an unacked message is visible again on the next poll.
    pub fn new(classifier: StubClassifier) -> Self {
        Self::with_visibility(classifier, Duration::ZERO)
    }

    pub fn with_visibility(classifier: StubClassifier, visibility: Duration) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        let status = Arc::new(MemoryStatusStore::new());
        let queue = Arc::new(MemoryJobQueue::new(visibility));
        let classifier = Arc::new(classifier);

        let submission = SubmissionService::new(blobs.clone(), status.clone(), queue.clone());
        let query = QueryService::new(status.clone());
        let worker = Worker::new(
            blobs.clone(),
            status.clone(),
            queue.clone(),
            classifier.clone(),
            VerdictPolicy::default(),
            Duration::from_secs(86_400),
        );

        Self {
            blobs,
            status,
            queue,
            classifier,
            submission,
            query,
            worker,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.blobs.clone(), self.status.clone(), self.queue.clone())
    }
}

pub fn hot_dog(confidence: f64) -> Vec<Detection> {
    vec![Detection::new("Hot dog", confidence)]
}

pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    let body = body.to_string();
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
