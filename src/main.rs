use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use hotdog_detect::app_state::AppState;
use hotdog_detect::config::AppConfig;
use hotdog_detect::db::{self, PgStatusStore};
use hotdog_detect::routes;
use hotdog_detect::services::{queue::RedisJobQueue, storage::S3BlobStore};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing hotdog-detect server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("jobs_submitted_total", "Images accepted for classification");
    metrics::describe_gauge!("job_queue_depth", "Messages waiting in the job queue");

    tracing::info!("Connecting to PostgreSQL status store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!(bucket = %config.blob_bucket, "Initializing blob store client");
    let blobs = S3BlobStore::new(
        &config.blob_bucket,
        &config.blob_region,
        &config.blob_endpoint,
        &config.blob_access_key,
        &config.blob_secret_key,
    )
    .expect("Failed to initialize blob store client");

    tracing::info!(queue = %config.queue_name, "Connecting to Redis job queue");
    let queue = RedisJobQueue::new(
        &config.redis_url,
        &config.queue_name,
        config.visibility_timeout(),
    )
    .expect("Failed to initialize job queue");

    let state = AppState::new(
        Arc::new(blobs),
        Arc::new(PgStatusStore::new(db_pool)),
        Arc::new(queue),
    );

    let app = routes::build_router(state, config.max_upload_bytes, Some(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
