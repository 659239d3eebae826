use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;
pub mod telemetry;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, imaging, queue, storage};

use auth::jwt::JwtService;
use queue::JobQueue;
use repositories::{
    image_task::ImageTaskRepository,
    sqlx_repo::{SqlxImageTaskRepo, SqlxUserRepo},
    user::UserRepository,
};
use storage::ObjectStorage;
use use_cases::{auth::AuthHandler, images::ImageHandler};

pub struct AppState {
    pub auth_handler: AppAuthHandler,
    pub image_handler: ImageHandler,
    pub queue: Arc<dyn JobQueue>,
    pub max_upload_bytes: usize,
}

pub type AppAuthHandler = AuthHandler<dyn UserRepository, JwtService>;

impl AppState {
    pub fn new(
        config: &settings::AppConfig,
        pool: sqlx::PgPool,
        storage: Arc<dyn ObjectStorage>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        let users = Arc::new(SqlxUserRepo::new(pool.clone()));
        let image_tasks = Arc::new(SqlxImageTaskRepo::new(pool));

        Self::from_parts(config, users, image_tasks, storage, queue)
    }

    /// Wires the state from arbitrary collaborator implementations.
    pub fn from_parts(
        config: &settings::AppConfig,
        users: Arc<dyn UserRepository>,
        image_tasks: Arc<dyn ImageTaskRepository>,
        storage: Arc<dyn ObjectStorage>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        let auth_handler = AuthHandler::new(users, JwtService::new(config));
        let image_handler = ImageHandler::new(config, storage, queue.clone(), image_tasks);

        AppState {
            auth_handler,
            image_handler,
            queue,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
