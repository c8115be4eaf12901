use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

use crate::db::StatusStore;
use crate::error::PipelineError;
use crate::models::job::{blob_key, JobMessage};
use crate::services::classifier::Classifier;
use crate::services::queue::{Delivery, JobQueue};
use crate::services::storage::BlobStore;
use crate::services::verdict::{derive_verdict, VerdictPolicy};

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Record moved to `FINISHED` and the delivery was acked.
    Finished { request_id: Uuid, result: bool },
    /// Body was not a usable envelope; acked and dropped.
    Poison,
}

/// Consumes queue messages and writes the terminal state for each job.
///
/// Holds no per-job state: everything is derived from the request id in the message.
pub struct Worker {
    blobs: Arc<dyn BlobStore>,
    status: Arc<dyn StatusStore>,
    queue: Arc<dyn JobQueue>,
    classifier: Arc<dyn Classifier>,
    policy: VerdictPolicy,
    signed_url_ttl: Duration,
}

impl Worker {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        status: Arc<dyn StatusStore>,
        queue: Arc<dyn JobQueue>,
        classifier: Arc<dyn Classifier>,
        policy: VerdictPolicy,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            blobs,
            status,
            queue,
            classifier,
            policy,
            signed_url_ttl,
        }
    }

    /// Process one delivery.
    ///
    /// The delivery is acked only after the terminal upsert succeeds. On any error it is
    /// left unacked so the queue redelivers it once its visibility timeout lapses, and
    /// the record stays `QUEUED`.
    pub async fn process(&self, delivery: &Delivery) -> Result<Outcome, PipelineError> {
        let request_id = match parse_request_id(&delivery.payload) {
            Ok(id) => id,
            Err(reason) => {
                tracing::error!(payload = %delivery.payload, reason = %reason, "Dropping poison message");
                metrics::counter!("jobs_poison_total").increment(1);
                self.queue.ack(delivery).await?;
                return Ok(Outcome::Poison);
            }
        };

        match self.classify_job(request_id).await {
            Ok(result) => {
                self.status.upsert_finished(request_id, result).await?;
                self.queue.ack(delivery).await?;

                metrics::counter!("jobs_finished_total", "result" => result.to_string())
                    .increment(1);
                tracing::info!(request_id = %request_id, result, "Job finished");

                Ok(Outcome::Finished { request_id, result })
            }
            Err(e) => {
                metrics::counter!("job_attempts_failed_total").increment(1);
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Job attempt failed, leaving message for redelivery"
                );
                Err(e)
            }
        }
    }

    async fn classify_job(&self, request_id: Uuid) -> Result<bool, PipelineError> {
        let key = blob_key(request_id);
        let url = self.blobs.signed_read_url(&key, self.signed_url_ttl).await?;
        tracing::debug!(request_id = %request_id, url = %url, "Signed read URL issued");

        let start = Instant::now();
        let detections = self.classifier.classify(&url).await?;
        let elapsed = start.elapsed();
        metrics::histogram!("classification_seconds").record(elapsed.as_secs_f64());

        tracing::debug!(
            request_id = %request_id,
            duration_ms = elapsed.as_millis() as u64,
            detections = ?detections,
            "Classification complete"
        );

        Ok(derive_verdict(&detections, &self.policy))
    }

    /// Reclaim expired leases, then consume and process one message.
    /// Returns `Ok(false)` when the queue had nothing visible.
    pub async fn poll_once(&self) -> Result<bool, PipelineError> {
        let reclaimed = self.queue.reclaim_expired().await?;
        if reclaimed > 0 {
            tracing::info!(reclaimed, "Expired deliveries made visible again");
        }

        let Some(delivery) = self.queue.consume().await? else {
            return Ok(false);
        };

        self.process(&delivery).await?;
        Ok(true)
    }

    /// Poll the queue until `shutdown` flips to true.
    ///
    /// If the sender side of `shutdown` is dropped the loop keeps running on its
    /// poll interval; it can then only be stopped by dropping the task.
    pub async fn run(&self, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Worker ready, starting job processing loop");
        let mut shutdown_live = true;

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(true) => {
                    tracing::debug!("Job processed, checking for next job");
                    false
                }
                Ok(false) => {
                    tracing::trace!("No jobs available, sleeping");
                    true
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(error = %e, "Error processing job, will retry");
                    true
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error processing job");
                    true
                }
            };

            if let Ok(depth) = self.queue.depth().await {
                metrics::gauge!("job_queue_depth").set(depth as f64);
            }

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    changed = shutdown.changed(), if shutdown_live => {
                        if changed.is_err() {
                            tracing::warn!("Shutdown sender dropped, polling on interval only");
                            shutdown_live = false;
                        }
                    }
                }
            }
        }

        tracing::info!("Worker stopped");
    }
}

fn parse_request_id(payload: &str) -> Result<Uuid, String> {
    let message: JobMessage =
        serde_json::from_str(payload).map_err(|e| format!("invalid envelope: {e}"))?;
    Uuid::parse_str(&message.req).map_err(|e| format!("invalid request id {:?}: {e}", message.req))
}
