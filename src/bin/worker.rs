use hotdog_detect::{
    config::AppConfig,
    db::{self, PgStatusStore},
    services::{
        classifier::ComputerVisionClient, queue::RedisJobQueue, storage::S3BlobStore,
        worker::Worker,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting classification worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let metrics_addr: SocketAddr = config
        .worker_metrics_addr
        .parse()
        .expect("Invalid WORKER_METRICS_ADDR");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus exporter");
    tracing::info!(addr = %metrics_addr, "Serving worker metrics");
    metrics::describe_histogram!(
        "classification_seconds",
        "Time spent in the classification call"
    );
    metrics::describe_counter!("jobs_finished_total", "Jobs moved to FINISHED");
    metrics::describe_counter!(
        "job_attempts_failed_total",
        "Attempts left unacknowledged for redelivery"
    );
    metrics::describe_counter!("jobs_poison_total", "Unparseable messages dropped");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Initializing services");
    let blobs = S3BlobStore::new(
        &config.blob_bucket,
        &config.blob_region,
        &config.blob_endpoint,
        &config.blob_access_key,
        &config.blob_secret_key,
    )
    .expect("Failed to initialize blob store client");

    let queue = RedisJobQueue::new(
        &config.redis_url,
        &config.queue_name,
        config.visibility_timeout(),
    )
    .expect("Failed to initialize job queue");

    let classifier = ComputerVisionClient::new(
        &config.vision_endpoint,
        &config.vision_key,
        config.classifier_timeout(),
    )
    .expect("Failed to initialize classifier client");

    let worker = Worker::new(
        Arc::new(blobs),
        Arc::new(PgStatusStore::new(db_pool)),
        Arc::new(queue),
        Arc::new(classifier),
        config.verdict_policy(),
        config.signed_url_ttl(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!(
        target_label = %config.target_label,
        threshold = config.confidence_threshold,
        "Worker ready"
    );
    worker.run(config.poll_interval(), shutdown_rx).await;
}
