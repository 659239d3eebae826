pub mod image_task;
pub mod job;
pub mod storage_link;
pub mod token;
pub mod user;
