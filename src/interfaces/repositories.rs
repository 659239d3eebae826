pub mod image_task;
pub mod sqlx_repo;
pub mod token;
pub mod user;
