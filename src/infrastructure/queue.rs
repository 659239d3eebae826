use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::job::{AugmentationJob, AugmentationResult, JobState, QueuedJob};
use crate::errors::QueueError;

pub mod redis;

/// Hands augmentation jobs from the API to the worker and tracks their state.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Records the job as pending and pushes it onto the queue. Returns the
    /// id clients poll with.
    async fn enqueue(&self, job: AugmentationJob) -> Result<Uuid, QueueError>;

    /// Current state of a job. Ids the queue has never seen report `pending`.
    async fn status(&self, job_id: &Uuid) -> Result<JobState, QueueError>;

    /// Takes the oldest queued job, if any. Does not block.
    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError>;

    async fn mark_running(&self, job_id: &Uuid) -> Result<(), QueueError>;
    async fn mark_succeeded(&self, job_id: &Uuid, result: AugmentationResult) -> Result<(), QueueError>;
    async fn mark_failed(&self, job_id: &Uuid, error: &str) -> Result<(), QueueError>;

    async fn check_connection(&self) -> Result<(), QueueError>;
}
