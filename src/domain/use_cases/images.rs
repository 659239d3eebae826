use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::entities::image_task::{ImageTask, ImageTaskWithStats, VariantFilenames};
use crate::entities::job::{AugmentationJob, JobStatusResponse, UploadResult};
use crate::entities::storage_link::StorageLink;
use crate::entities::user::User;
use crate::errors::AppError;
use crate::queue::JobQueue;
use crate::repositories::image_task::ImageTaskRepository;
use crate::settings::{AppConfig, JobAccessPolicy};
use crate::storage::ObjectStorage;

/// A file received in an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// A finished zip archive of one task's images.
#[derive(Debug)]
pub struct TaskArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// API-side image operations: accepting uploads and reading job results.
pub struct ImageHandler {
    storage: Arc<dyn ObjectStorage>,
    queue: Arc<dyn JobQueue>,
    image_tasks: Arc<dyn ImageTaskRepository>,
    bucket: String,
    policy: JobAccessPolicy,
    rotation_degrees: i32,
}

impl ImageHandler {
    pub fn new(
        config: &AppConfig,
        storage: Arc<dyn ObjectStorage>,
        queue: Arc<dyn JobQueue>,
        image_tasks: Arc<dyn ImageTaskRepository>,
    ) -> Self {
        ImageHandler {
            storage,
            queue,
            image_tasks,
            bucket: config.storage_bucket.clone(),
            policy: config.job_access_policy,
            rotation_degrees: config.rotation_degrees,
        }
    }

    /// Stores every original and enqueues one job per file. Files run
    /// concurrently; results keep the input order. Nothing is stored unless
    /// every file is an image.
    #[instrument(skip(self, user, files), fields(user_id = %user.id, files = files.len()))]
    pub async fn upload_all(&self, user: &User, files: Vec<UploadedFile>) -> Result<Vec<UploadResult>, AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest("No files provided".to_string()));
        }
        for file in &files {
            check_image(file)?;
        }

        try_join_all(files.into_iter().map(|file| self.upload_one(user.id, file))).await
    }

    async fn upload_one(&self, user_id: Uuid, file: UploadedFile) -> Result<UploadResult, AppError> {
        let filenames = VariantFilenames::from_upload(&file.file_name);
        let source = self.storage.put(&self.bucket, &filenames.original, file.data).await?;

        let job_id = self.queue.enqueue(AugmentationJob {
            source,
            filenames,
            user_id,
            degrees: self.rotation_degrees,
        }).await?;

        debug!(%job_id, file = %file.file_name, "Upload queued for augmentation");
        Ok(UploadResult {
            file: file.file_name,
            augmentation_task_id: job_id,
        })
    }

    pub async fn job_status(&self, user: &User, task_id: &Uuid) -> Result<JobStatusResponse, AppError> {
        let state = self.queue.status(task_id).await?;

        if let Some(owner) = state.owner {
            self.authorize(user, &owner)?;
        }

        Ok(state.into())
    }

    /// Every stored image of `user_id` with its stats.
    pub async fn history(&self, user: &User, user_id: &Uuid) -> Result<Vec<ImageTaskWithStats>, AppError> {
        self.authorize(user, user_id)?;

        let images = self.image_tasks.list_by_user(user_id).await?;
        if images.is_empty() {
            return Err(AppError::NotFound(format!("No images found for user {}", user_id)));
        }

        Ok(images)
    }

    /// Zips every image recorded for `task_id`, one entry per stored object.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn task_archive(&self, user: &User, task_id: &Uuid) -> Result<TaskArchive, AppError> {
        let rows = self.image_tasks.list_by_task(task_id).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("No images found for task {}", task_id)));
        }
        for row in &rows {
            self.authorize(user, &row.user_id)?;
        }

        let entries = try_join_all(rows.iter().map(|row| self.fetch_entry(row))).await?;

        let bytes = tokio::task::spawn_blocking(move || build_zip(entries))
            .await
            .map_err(|e| AppError::InternalError(format!("Archive task aborted: {}", e)))??;

        info!(%task_id, size = bytes.len(), "Task archive built");
        Ok(TaskArchive {
            file_name: format!("{}_images.zip", task_id),
            bytes,
        })
    }

    async fn fetch_entry(&self, row: &ImageTask) -> Result<(String, Bytes), AppError> {
        let link: StorageLink = row.img_link.parse()?;
        let data = self.storage.get_link(&link).await?;
        Ok((link.key, data))
    }

    fn authorize(&self, user: &User, owner: &Uuid) -> Result<(), AppError> {
        match self.policy {
            JobAccessPolicy::AnyAuthenticated => Ok(()),
            JobAccessPolicy::OwnerOnly if &user.id == owner => Ok(()),
            JobAccessPolicy::OwnerOnly => {
                tracing::warn!(user_id = %user.id, %owner, "Rejected access to another user's images");
                Err(AppError::ForbiddenAccess)
            }
        }
    }
}

fn check_image(file: &UploadedFile) -> Result<(), AppError> {
    if file.data.is_empty() {
        return Err(AppError::BadRequest(format!("{} is empty", file.file_name)));
    }
    if !infer::is_image(&file.data) {
        return Err(AppError::BadRequest(format!("{} is not an image", file.file_name)));
    }
    Ok(())
}

fn build_zip(entries: Vec<(String, Bytes)>) -> Result<Vec<u8>, AppError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut seen = HashSet::new();

    for (name, data) in entries {
        if !seen.insert(name.clone()) {
            continue;
        }
        writer.start_file(name, options).map_err(zip_error)?;
        writer.write_all(&data).map_err(|e| AppError::InternalError(format!("Zip write failed: {}", e)))?;
    }

    Ok(writer.finish().map_err(zip_error)?.into_inner())
}

fn zip_error(err: zip::result::ZipError) -> AppError {
    AppError::InternalError(format!("Zip archive error: {}", err))
}
