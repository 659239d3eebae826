use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::image_task::{Variant, VariantFilenames};
use crate::entities::storage_link::StorageLink;

/// Arguments of one augmentation job, as carried through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationJob {
    pub source: StorageLink,
    pub filenames: VariantFilenames,
    pub user_id: Uuid,
    #[serde(default = "default_degrees")]
    pub degrees: i32,
}

fn default_degrees() -> i32 {
    90
}

/// A job popped from the queue, tagged with the id assigned at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: AugmentationJob,
}

/// Storage links of the derived variants, keyed by variant.
pub type AugmentationResult = BTreeMap<Variant, StorageLink>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Status record of a job as kept by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AugmentationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobState {
    pub fn pending(owner: Option<Uuid>) -> Self {
        JobState {
            status: JobStatus::Pending,
            owner,
            enqueued_at: Some(Utc::now()),
            result: None,
            error: None,
        }
    }

    /// What the broker reports for an id it has no record of.
    pub fn unknown() -> Self {
        JobState {
            status: JobStatus::Pending,
            owner: None,
            enqueued_at: None,
            result: None,
            error: None,
        }
    }
}

/// Body of `GET /status/{task_id}`. The owner stays server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AugmentationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobState> for JobStatusResponse {
    fn from(state: JobState) -> Self {
        JobStatusResponse {
            status: state.status,
            result: state.result,
            error: state.error,
        }
    }
}

/// Per-file response of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub file: String,
    pub augmentation_task_id: Uuid,
}
