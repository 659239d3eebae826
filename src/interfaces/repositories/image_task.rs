use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    entities::image_task::{ImageRecord, ImageStats, ImageTask, ImageTaskWithStats},
    errors::AppError,
    repositories::sqlx_repo::SqlxImageTaskRepo,
};

/// Read side of the image metadata plus the entry point for a job's
/// unit of work.
#[async_trait]
pub trait ImageTaskRepository: Send + Sync {
    /// Opens a unit of work. Nothing written through it is visible to other
    /// readers until `commit`.
    async fn begin(&self) -> Result<Box<dyn ImageTaskSession>, AppError>;

    /// All images owned by `user_id`, oldest first, with their stats.
    async fn list_by_user(&self, user_id: &Uuid) -> Result<Vec<ImageTaskWithStats>, AppError>;

    /// All images produced by the job `task_id`.
    async fn list_by_task(&self, task_id: &Uuid) -> Result<Vec<ImageTask>, AppError>;
}

/// One job's pending writes.
#[async_trait]
pub trait ImageTaskSession: Send {
    /// Inserts an ImageTask row and its Stats row, returning the image id.
    async fn insert_image(&mut self, record: &ImageRecord) -> Result<Uuid, AppError>;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

impl SqlxImageTaskRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxImageTaskRepo { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ImageTaskStatsRow {
    id: Uuid,
    task_id: Uuid,
    user_id: Uuid,
    img_link: String,
    created_at: DateTime<Utc>,
    width: Option<i32>,
    height: Option<i32>,
    size: Option<i64>,
    processing_time: Option<f64>,
}

impl From<ImageTaskStatsRow> for ImageTaskWithStats {
    fn from(row: ImageTaskStatsRow) -> Self {
        let stats = match (row.width, row.height, row.size, row.processing_time) {
            (Some(width), Some(height), Some(size), Some(processing_time)) => Some(ImageStats {
                width: width.max(0) as u32,
                height: height.max(0) as u32,
                size: size.max(0) as u64,
                processing_time,
            }),
            _ => None,
        };

        ImageTaskWithStats {
            image: ImageTask {
                id: row.id,
                task_id: row.task_id,
                user_id: row.user_id,
                img_link: row.img_link,
                created_at: row.created_at,
            },
            stats,
        }
    }
}

#[async_trait]
impl ImageTaskRepository for SqlxImageTaskRepo {
    async fn begin(&self) -> Result<Box<dyn ImageTaskSession>, AppError> {
        let tx = self.pool.begin().await.map_err(AppError::from)?;
        Ok(Box::new(SqlxImageTaskSession { tx }))
    }

    async fn list_by_user(&self, user_id: &Uuid) -> Result<Vec<ImageTaskWithStats>, AppError> {
        let rows = sqlx::query_as::<_, ImageTaskStatsRow>(
            r#"
            SELECT t.id, t.task_id, t.user_id, t.img_link, t.created_at,
                   s.width, s.height, s.size, s.processing_time
            FROM image_tasks t
            LEFT JOIN stats s ON s.image_id = t.id
            WHERE t.user_id = $1
            ORDER BY t.created_at, t.id
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(ImageTaskWithStats::from).collect())
    }

    async fn list_by_task(&self, task_id: &Uuid) -> Result<Vec<ImageTask>, AppError> {
        sqlx::query_as::<_, ImageTask>(
            "SELECT id, task_id, user_id, img_link, created_at
             FROM image_tasks WHERE task_id = $1 ORDER BY created_at, id"
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }
}

pub struct SqlxImageTaskSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ImageTaskSession for SqlxImageTaskSession {
    async fn insert_image(&mut self, record: &ImageRecord) -> Result<Uuid, AppError> {
        let image_id: Uuid = sqlx::query_scalar(
            "INSERT INTO image_tasks (task_id, user_id, img_link) VALUES ($1, $2, $3) RETURNING id"
        )
        .bind(record.task_id)
        .bind(record.user_id)
        .bind(&record.img_link)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        sqlx::query(
            "INSERT INTO stats (image_id, width, height, size, processing_time)
             VALUES ($1, $2, $3, $4, $5)"
        )
        .bind(image_id)
        .bind(record.stats.width as i32)
        .bind(record.stats.height as i32)
        .bind(record.stats.size as i64)
        .bind(record.stats.processing_time)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(image_id)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(AppError::from)
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await.map_err(AppError::from)
    }
}
