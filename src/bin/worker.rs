use std::sync::Arc;

use receipt_tracker::jobs::{self, QueueBackend, RedisBackend, RedisEndpoint, WorkerPool};
use receipt_tracker::{config, logging, signal::shutdown_signal};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_cfg = config::load()?;
    let log_guards = logging::init(&app_cfg.logging, app_cfg.env)?;
    logging::install_panic_hook();

    let endpoint = RedisEndpoint::parse(&app_cfg.redis.url)?;
    let backend: Arc<dyn QueueBackend> =
        Arc::new(RedisBackend::connect(&endpoint, &app_cfg.queues.redis_prefix).await?);

    let pool = WorkerPool::new();
    for worker in jobs::standard_workers(&app_cfg, backend) {
        info!(queue = %worker.queue(), concurrency = worker.concurrency(), "Starting worker");
        pool.spawn(worker);
    }
    info!("Background workers started");

    let signal = shutdown_signal().await;
    info!("{} received. Shutting down workers...", signal);

    match pool.shutdown(app_cfg.server.shutdown_timeout).await {
        Ok(()) => {
            info!("All workers shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Error during worker shutdown: {}", e);
            drop(log_guards);
            std::process::exit(1);
        }
    }
}
