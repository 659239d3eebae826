use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Redis list the API pushes augmentation jobs onto and the worker pops from.
pub const JOB_QUEUE_KEY: &str = "augmentation:queue";

/// Prefix of the per-job status record kept in Redis.
pub const JOB_RECORD_PREFIX: &str = "augmentation:job";
