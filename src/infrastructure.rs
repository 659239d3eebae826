pub mod auth;
pub mod db;
pub mod imaging;
pub mod queue;
pub mod storage;
