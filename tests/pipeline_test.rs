//! Pipeline behaviour against in-memory adapters: submit, classify, poll.

mod helpers;

use futures::future::join_all;
use helpers::*;
use hotdog_detect::db::StatusStore;
use hotdog_detect::models::job::{Detection, JobSummary, ProcessingState};
use hotdog_detect::services::classifier::StubClassifier;
use hotdog_detect::services::queue::JobQueue;
use hotdog_detect::services::worker::Outcome;
use uuid::Uuid;

fn find(jobs: &[JobSummary], id: Uuid) -> Vec<&JobSummary> {
    jobs.iter().filter(|j| j.request_id == id).collect()
}

#[tokio::test]
async fn test_submitted_job_is_listed_as_queued() {
    let h = Harness::new(StubClassifier::fixed(vec![]));
    let response = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap();

    let jobs = h.query.list_jobs().await.unwrap();
    let matching = find(&jobs, response.request_id);
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].state, ProcessingState::Queued);
    assert!(!matching[0].result);
}

#[tokio::test]
async fn test_hot_dog_photo_ends_finished_true() {
    let h = Harness::new(StubClassifier::fixed(hot_dog(0.75)));
    let id = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap().request_id;

    assert!(h.worker.poll_once().await.unwrap());

    let jobs = h.query.list_jobs().await.unwrap();
    let job = find(&jobs, id)[0];
    assert_eq!(job.state, ProcessingState::Finished);
    assert!(job.result);
}

#[tokio::test]
async fn test_pizza_photo_ends_finished_false() {
    let h = Harness::new(StubClassifier::fixed(vec![Detection::new("Pizza", 0.95)]));
    let id = h.submission.submit(TINY_PNG, "pizza.png").await.unwrap().request_id;

    assert!(h.worker.poll_once().await.unwrap());

    let record = h.status.get(id).await.unwrap().unwrap();
    assert_eq!(record.processing_state, ProcessingState::Finished);
    assert!(!record.result);
}

#[tokio::test]
async fn test_confidence_at_threshold_is_negative() {
    let h = Harness::new(StubClassifier::fixed(hot_dog(0.6)));
    let id = h.submission.submit(TINY_PNG, "edge.png").await.unwrap().request_id;
    h.worker.poll_once().await.unwrap();
    assert!(!h.status.get(id).await.unwrap().unwrap().result);

    let h = Harness::new(StubClassifier::fixed(hot_dog(0.600_000_1)));
    let id = h.submission.submit(TINY_PNG, "edge.png").await.unwrap().request_id;
    h.worker.poll_once().await.unwrap();
    assert!(h.status.get(id).await.unwrap().unwrap().result);
}

#[tokio::test]
async fn test_timeout_then_success_never_exposes_wrong_state() {
    let h = Harness::new(StubClassifier::fixed(hot_dog(0.9)).then_fail("request timed out"));
    let id = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap().request_id;

    // First delivery fails; the message is left unacked.
    assert!(h.worker.poll_once().await.is_err());
    let jobs = h.query.list_jobs().await.unwrap();
    let job = find(&jobs, id)[0];
    assert_eq!(job.state, ProcessingState::Queued);
    assert!(!job.result);

    // Redelivery succeeds.
    assert!(h.worker.poll_once().await.unwrap());
    let jobs = h.query.list_jobs().await.unwrap();
    let job = find(&jobs, id)[0];
    assert_eq!(job.state, ProcessingState::Finished);
    assert!(job.result);

    assert_eq!(h.classifier.calls(), 2);
    assert_eq!(h.queue.in_flight(), 0);
    assert_eq!(h.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let h = Harness::new(StubClassifier::fixed(hot_dog(0.8)));
    let id = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap().request_id;

    let delivery = h.queue.consume().await.unwrap().unwrap();
    h.worker.process(&delivery).await.unwrap();
    let once = h.status.get(id).await.unwrap().unwrap();

    // The same message arrives again, e.g. after a lost ack.
    h.queue.publish_raw(delivery.payload.clone());
    let again = h.queue.consume().await.unwrap().unwrap();
    let outcome = h.worker.process(&again).await.unwrap();
    let twice = h.status.get(id).await.unwrap().unwrap();

    assert_eq!(outcome, Outcome::Finished { request_id: id, result: true });
    assert_eq!(twice.request_id, once.request_id);
    assert_eq!(twice.processing_state, once.processing_state);
    assert_eq!(twice.result, once.result);
    assert_eq!(twice.file_name, once.file_name);
    assert_eq!(h.query.list_jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_overlapping_duplicate_deliveries_converge() {
    let h = Harness::new(StubClassifier::fixed(hot_dog(0.8)));
    let id = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap().request_id;

    let first = h.queue.consume().await.unwrap().unwrap();
    h.queue.publish_raw(first.payload.clone());
    let second = h.queue.consume().await.unwrap().unwrap();

    let results = join_all([h.worker.process(&first), h.worker.process(&second)]).await;
    for result in results {
        assert_eq!(result.unwrap(), Outcome::Finished { request_id: id, result: true });
    }

    let record = h.status.get(id).await.unwrap().unwrap();
    assert_eq!(record.processing_state, ProcessingState::Finished);
    assert!(record.result);
}

#[tokio::test]
async fn test_many_jobs_processed_independently() {
    let h = Harness::new(StubClassifier::fixed(hot_dog(0.9)));
    let mut ids = Vec::new();
    for i in 0..5 {
        let name = format!("photo-{i}.png");
        ids.push(h.submission.submit(TINY_PNG, &name).await.unwrap().request_id);
    }

    while h.worker.poll_once().await.unwrap() {}

    let jobs = h.query.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 5);
    for id in ids {
        let job = find(&jobs, id)[0];
        assert_eq!(job.state, ProcessingState::Finished);
        assert!(job.result);
    }
}

#[tokio::test]
async fn test_message_only_carries_request_id() {
    let h = Harness::new(StubClassifier::fixed(vec![]));
    let id = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap().request_id;

    let payloads = h.queue.pending_payloads();
    assert_eq!(payloads.len(), 1);
    let message: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(message, serde_json::json!({ "req": id.to_string() }));
}

#[tokio::test]
async fn test_jobs_get_independent_verdicts_in_submission_order() {
    let h = Harness::new(
        StubClassifier::fixed(hot_dog(0.9)).then_return(vec![Detection::new("Pizza", 0.9)]),
    );
    let pizza = h.submission.submit(TINY_PNG, "pizza.png").await.unwrap().request_id;
    let sausage = h.submission.submit(TINY_PNG, "lunch.png").await.unwrap().request_id;

    assert!(h.worker.poll_once().await.unwrap());
    assert!(h.worker.poll_once().await.unwrap());

    let pizza = h.status.get(pizza).await.unwrap().unwrap();
    let sausage = h.status.get(sausage).await.unwrap().unwrap();
    assert_eq!(pizza.processing_state, ProcessingState::Finished);
    assert!(!pizza.result);
    assert_eq!(sausage.processing_state, ProcessingState::Finished);
    assert!(sausage.result);
}
