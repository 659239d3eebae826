use std::sync::Arc;
use std::time::Duration;

use image_augmentation::{
    background_task::WorkerContext,
    db::postgres::create_pool,
    graceful_shutdown::shutdown_signal,
    queue::redis::RedisJobQueue,
    repositories::sqlx_repo::SqlxImageTaskRepo,
    settings::AppConfig,
    storage::s3::S3Storage,
    telemetry::init_tracing,
    use_cases::augmentation::AugmentationHandler,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new()?;
    init_tracing(&config);

    // Each in-flight job holds one connection for its transaction.
    let pool = create_pool(&config.database_url, config.worker_database_max_connections).await?;
    let queue = RedisJobQueue::new(&config.redis_url, config.job_result_ttl_secs)?;

    let augmentation = AugmentationHandler::new(
        Arc::new(S3Storage::new(&config)),
        Arc::new(SqlxImageTaskRepo::new(pool)),
    );
    let ctx = WorkerContext::new(
        Arc::new(queue),
        augmentation,
        Duration::from_millis(config.worker_poll_interval_ms),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = tokio::spawn(ctx.run(config.worker_concurrency, shutdown_rx));

    tracing::info!(
        concurrency = config.worker_concurrency,
        "🚀 Augmentation worker v{} started",
        env!("CARGO_PKG_VERSION")
    );

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    workers.await?;
    tracing::info!("Worker stopped after finishing in-flight jobs");
    Ok(())
}
