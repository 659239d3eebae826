use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::constants::{JOB_QUEUE_KEY, JOB_RECORD_PREFIX};
use crate::entities::job::{AugmentationJob, AugmentationResult, JobState, JobStatus, QueuedJob};
use crate::errors::QueueError;

use super::JobQueue;

/// Redis-backed queue: jobs are JSON entries in a list (LPUSH/RPOP, FIFO) and
/// each job has a JSON status record that expires after `result_ttl_secs`.
#[derive(Clone)]
pub struct RedisJobQueue {
    pool: Pool,
    result_ttl_secs: u64,
}

impl RedisJobQueue {
    pub fn new(redis_url: &str, result_ttl_secs: u64) -> Result<Self, QueueError> {
        let pool = RedisPoolConfig::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(RedisJobQueue {
            pool,
            result_ttl_secs: result_ttl_secs.max(1),
        })
    }

    async fn conn(&self) -> Result<Connection, QueueError> {
        Ok(self.pool.get().await?)
    }

    fn record_key(job_id: &Uuid) -> String {
        format!("{}:{}", JOB_RECORD_PREFIX, job_id)
    }

    async fn read_state(&self, job_id: &Uuid) -> Result<Option<JobState>, QueueError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(Self::record_key(job_id)).await?;

        raw.map(|r| serde_json::from_str::<JobState>(&r))
            .transpose()
            .map_err(QueueError::from)
    }

    async fn write_state(&self, job_id: &Uuid, state: &JobState) -> Result<(), QueueError> {
        let payload = serde_json::to_string(state)?;
        let mut conn = self.conn().await?;
        let _: () = conn
            .set_ex(Self::record_key(job_id), payload, self.result_ttl_secs)
            .await?;
        Ok(())
    }

    /// Moves a job to `status`, keeping what enqueue recorded.
    async fn transition(
        &self,
        job_id: &Uuid,
        status: JobStatus,
        result: Option<AugmentationResult>,
        error: Option<String>,
    ) -> Result<(), QueueError> {
        let mut state = self.read_state(job_id).await?.unwrap_or_else(JobState::unknown);
        state.status = status;
        state.result = result;
        state.error = error;
        self.write_state(job_id, &state).await
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    #[instrument(skip(self, job), fields(user_id = %job.user_id))]
    async fn enqueue(&self, job: AugmentationJob) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        let state = serde_json::to_string(&JobState::pending(Some(job.user_id)))?;
        let payload = serde_json::to_string(&QueuedJob { id, job })?;

        let mut conn = self.conn().await?;
        let _: () = redis::pipe()
            .atomic()
            .set_ex(Self::record_key(&id), state, self.result_ttl_secs)
            .ignore()
            .lpush(JOB_QUEUE_KEY, payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn status(&self, job_id: &Uuid) -> Result<JobState, QueueError> {
        Ok(self.read_state(job_id).await?.unwrap_or_else(JobState::unknown))
    }

    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.rpop(JOB_QUEUE_KEY, None).await?;

        match raw {
            Some(raw) => serde_json::from_str::<QueuedJob>(&raw).map(Some).map_err(|e| {
                error!("Dropping malformed queue entry: {}", e);
                QueueError::from(e)
            }),
            None => Ok(None),
        }
    }

    async fn mark_running(&self, job_id: &Uuid) -> Result<(), QueueError> {
        self.transition(job_id, JobStatus::Running, None, None).await
    }

    async fn mark_succeeded(&self, job_id: &Uuid, result: AugmentationResult) -> Result<(), QueueError> {
        self.transition(job_id, JobStatus::Succeeded, Some(result), None).await
    }

    async fn mark_failed(&self, job_id: &Uuid, error: &str) -> Result<(), QueueError> {
        self.transition(job_id, JobStatus::Failed, None, Some(error.to_string())).await
    }

    async fn check_connection(&self) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(QueueError::Command(format!("unexpected PING reply: {}", pong)))
        }
    }
}
