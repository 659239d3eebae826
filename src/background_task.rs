use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info, instrument, warn};

use crate::entities::job::QueuedJob;
use crate::errors::QueueError;
use crate::queue::JobQueue;
use crate::use_cases::augmentation::AugmentationHandler;

const STATUS_UPDATE_ATTEMPTS: u32 = 3;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Everything a worker loop needs to consume augmentation jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<dyn JobQueue>,
    pub augmentation: AugmentationHandler,
    pub poll_interval: Duration,
}

impl WorkerContext {
    pub fn new(queue: Arc<dyn JobQueue>, augmentation: AugmentationHandler, poll_interval: Duration) -> Self {
        WorkerContext {
            queue,
            augmentation,
            poll_interval,
        }
    }

    /// Pops and runs one job. Returns `false` when the queue was empty.
    pub async fn process_next(&self) -> Result<bool, QueueError> {
        match self.queue.dequeue().await? {
            Some(job) => {
                self.process(job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs a popped job. The job is already off the queue, so it runs even
    /// when its status cannot be updated; status writes are retried and a
    /// final failure is logged and returned.
    #[instrument(skip(self, queued), fields(job_id = %queued.id))]
    async fn process(&self, queued: QueuedJob) -> Result<(), QueueError> {
        if let Err(e) = self.update_status(|| self.queue.mark_running(&queued.id)).await {
            error!("Could not mark job running, running it anyway: {}", e);
        }

        let recorded = match self.augmentation.run(queued.id, &queued.job).await {
            Ok(result) => {
                info!("Job succeeded");
                self.update_status(|| self.queue.mark_succeeded(&queued.id, result.clone()))
                    .await
            }
            Err(e) => {
                error!("Job failed: {}", e);
                let message = e.to_string();
                self.update_status(|| self.queue.mark_failed(&queued.id, &message))
                    .await
            }
        };

        if let Err(e) = &recorded {
            error!("Could not record job outcome: {}", e);
        }
        recorded
    }

    async fn update_status<F, Fut>(&self, update: F) -> Result<(), QueueError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), QueueError>>,
    {
        let mut attempt = 1;
        loop {
            match update().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < STATUS_UPDATE_ATTEMPTS => {
                    warn!(attempt, "Status update failed, retrying: {}", e);
                    sleep(STATUS_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs `concurrency` consumer loops until `shutdown` flips to true.
    /// A loop always finishes the job it holds before exiting.
    pub async fn run(self, concurrency: usize, shutdown: watch::Receiver<bool>) {
        let handles = (0..concurrency.max(1))
            .map(|n| {
                let ctx = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { ctx.consume(n, shutdown).await })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker loop panicked: {}", e);
            }
        }
    }

    async fn consume(&self, n: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker = n, "Worker loop started");

        while !*shutdown.borrow() {
            let idle = match self.process_next().await {
                Ok(processed) => !processed,
                Err(e) => {
                    warn!(worker = n, "Queue error: {}", e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(worker = n, "Worker loop stopped");
    }
}
