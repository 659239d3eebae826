pub mod augmentation;
pub mod auth;
pub mod extractors;
pub mod images;
