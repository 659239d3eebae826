use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::entities::image_task::ImageRecord;
use crate::entities::job::{AugmentationJob, AugmentationResult};
use crate::errors::PipelineError;
use crate::imaging::{self, RenderedImages};
use crate::repositories::image_task::{ImageTaskRepository, ImageTaskSession};
use crate::storage::ObjectStorage;

/// The worker body: turns one uploaded original into its rotated, gray and
/// scaled variants and records all four images atomically.
#[derive(Clone)]
pub struct AugmentationHandler {
    storage: Arc<dyn ObjectStorage>,
    image_tasks: Arc<dyn ImageTaskRepository>,
}

impl AugmentationHandler {
    pub fn new(storage: Arc<dyn ObjectStorage>, image_tasks: Arc<dyn ImageTaskRepository>) -> Self {
        AugmentationHandler {
            storage,
            image_tasks,
        }
    }

    /// Runs job `job_id`. Either all four ImageTask/Stats pairs are committed
    /// or none are; on failure the original error is returned.
    #[instrument(skip(self, job), fields(user_id = %job.user_id, source = %job.source))]
    pub async fn run(&self, job_id: Uuid, job: &AugmentationJob) -> Result<AugmentationResult, PipelineError> {
        let bytes = self.storage.get_link(&job.source).await?;

        let degrees = job.degrees;
        let rendered = tokio::task::spawn_blocking(move || imaging::render_variants(&bytes, degrees))
            .await
            .map_err(|e| PipelineError::Transform(format!("image task aborted: {}", e)))??;

        let mut session = self.image_tasks.begin().await?;

        match self.persist(session.as_mut(), job_id, job, rendered).await {
            Ok(result) => {
                session.commit().await?;
                info!(variants = result.len(), "Augmentation committed");
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = session.rollback().await {
                    error!("Rollback failed after {}: {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        session: &mut dyn ImageTaskSession,
        job_id: Uuid,
        job: &AugmentationJob,
        rendered: RenderedImages,
    ) -> Result<AugmentationResult, PipelineError> {
        session
            .insert_image(&ImageRecord::new(job_id, job.user_id, job.source.to_string(), rendered.original))
            .await?;

        let mut result = AugmentationResult::new();
        for variant in rendered.variants {
            let key = job.filenames.get(variant.variant);
            let link = self
                .storage
                .put(&job.source.bucket, key, Bytes::from(variant.bytes))
                .await?;

            session
                .insert_image(&ImageRecord::new(job_id, job.user_id, link.to_string(), variant.stats))
                .await?;
            result.insert(variant.variant, link);
        }

        Ok(result)
    }
}
