mod test_utils;

use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use image_augmentation::{
    entities::{
        image_task::{Variant, VariantFilenames},
        job::{AugmentationJob, JobStatus},
        storage_link::StorageLink,
    },
    errors::{PipelineError, QueueError, StorageError},
    queue::JobQueue,
    storage::ObjectStorage,
};
use test_utils::*;
use tokio::sync::watch;
use uuid::Uuid;

async fn stage_upload(fx: &TestApp, file_name: &str, data: Vec<u8>, degrees: i32) -> AugmentationJob {
    let filenames = VariantFilenames::from_upload(file_name);
    let source = fx
        .storage
        .put("images", &filenames.original, Bytes::from(data))
        .await
        .unwrap();

    AugmentationJob {
        source,
        filenames,
        user_id: Uuid::new_v4(),
        degrees,
    }
}

#[tokio::test]
async fn pipeline_on_square_png_records_four_images() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "square.png", png_bytes(100, 100), 90).await;
    let job_id = Uuid::new_v4();

    let result = fx.augmentation().run(job_id, &job).await.unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result[&Variant::Rotated], StorageLink::new("images", "square_rotated.png"));
    assert_eq!(fx.storage.put_count(), 4);

    let rows = fx.image_tasks.committed();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.task.task_id == job_id && r.task.user_id == job.user_id));

    let stats_of = |link: &str| rows.iter().find(|r| r.task.img_link == link).unwrap().stats;

    let original = stats_of("images/square_original.png");
    assert_eq!((original.width, original.height), (100, 100));
    assert!(original.size > 0);
    assert_eq!(original.processing_time, 0.0);

    let rotated = stats_of("images/square_rotated.png");
    assert_eq!((rotated.width, rotated.height), (100, 100));

    let gray = stats_of("images/square_gray.png");
    assert_eq!((gray.width, gray.height), (100, 100));

    let scaled = stats_of("images/square_scaled.png");
    assert_eq!((scaled.width, scaled.height), (50, 50));

    for variant in [&rotated, &gray, &scaled] {
        assert!(variant.size > 0);
        assert!(variant.processing_time >= 0.0);
    }
    assert_eq!(fx.image_tasks.commits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn right_angle_rotation_swaps_dimensions() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "wide.png", png_bytes(120, 80), 90).await;

    fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap();

    let rows = fx.image_tasks.committed();
    let rotated = rows.iter().find(|r| r.task.img_link == "images/wide_rotated.png").unwrap();
    assert_eq!((rotated.stats.width, rotated.stats.height), (80, 120));
}

#[tokio::test]
async fn oblique_rotation_expands_the_canvas() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "square.png", png_bytes(100, 100), 45).await;

    fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap();

    let rows = fx.image_tasks.committed();
    let rotated = rows.iter().find(|r| r.task.img_link == "images/square_rotated.png").unwrap();
    assert!(rotated.stats.width > 100);
    assert_eq!(rotated.stats.width, rotated.stats.height);
}

#[tokio::test]
async fn variants_are_written_back_as_decodable_images() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "square.png", png_bytes(100, 100), 90).await;

    fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap();

    let gray = fx.storage.object("images", "square_gray.png").unwrap();
    let decoded = image::load_from_memory(&gray).unwrap();
    assert_eq!(image::guess_format(&gray).unwrap(), image::ImageFormat::Png);
    assert_eq!(decoded.color(), image::ColorType::L8);
}

#[tokio::test]
async fn insert_failure_rolls_back_every_row() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "square.png", png_bytes(100, 100), 90).await;
    fx.image_tasks.fail_on_insert(2);

    let err = fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap_err();

    assert!(matches!(err, PipelineError::Database(_)));
    assert!(fx.image_tasks.committed().is_empty());
    assert_eq!(fx.image_tasks.rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(fx.image_tasks.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_source_fails_before_any_transaction() {
    let fx = TestApp::new();
    let job = AugmentationJob {
        source: StorageLink::new("images", "nowhere_original.png"),
        filenames: VariantFilenames::from_upload("nowhere.png"),
        user_id: Uuid::new_v4(),
        degrees: 90,
    };

    let err = fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap_err();

    assert!(matches!(err, PipelineError::Storage(StorageError::NotFound(_))));
    assert_eq!(fx.image_tasks.begun.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn undecodable_source_is_a_decode_failure() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "broken.png", b"\x89PNG\r\n\x1a\nnot really".to_vec(), 90).await;

    let err = fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap_err();

    assert!(matches!(err, PipelineError::Decode(_)));
    assert!(fx.image_tasks.committed().is_empty());
}

#[tokio::test]
async fn single_pixel_image_cannot_be_downscaled() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "dot.png", png_bytes(1, 1), 90).await;

    let err = fx.augmentation().run(Uuid::new_v4(), &job).await.unwrap_err();

    assert!(matches!(err, PipelineError::Transform(_)));
    assert!(fx.image_tasks.committed().is_empty());
    assert_eq!(fx.storage.put_count(), 1);
}

#[tokio::test]
async fn worker_marks_jobs_succeeded_or_failed() {
    let fx = TestApp::new();
    let good = stage_upload(&fx, "good.png", png_bytes(10, 10), 90).await;
    let good_id = fx.queue.push(good);
    let bad_id = fx.queue.push(AugmentationJob {
        source: StorageLink::new("images", "gone_original.png"),
        filenames: VariantFilenames::from_upload("gone.png"),
        user_id: Uuid::new_v4(),
        degrees: 90,
    });

    let worker = fx.worker();
    assert!(worker.process_next().await.unwrap());
    assert!(worker.process_next().await.unwrap());
    assert!(!worker.process_next().await.unwrap());

    let good = fx.queue.status(&good_id).await.unwrap();
    assert_eq!(good.status, JobStatus::Succeeded);
    assert_eq!(good.result.unwrap().len(), 3);

    let bad = fx.queue.status(&bad_id).await.unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert!(bad.error.unwrap().contains("gone_original.png"));
}

#[tokio::test]
async fn worker_runs_a_popped_job_when_it_cannot_mark_it_running() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "flaky.png", png_bytes(10, 10), 90).await;
    let job_id = fx.queue.push(job);
    fx.queue.fail_status_updates(3);

    assert!(fx.worker().process_next().await.unwrap());

    assert_eq!(fx.image_tasks.committed().len(), 4);
    let state = fx.queue.status(&job_id).await.unwrap();
    assert_eq!(state.status, JobStatus::Succeeded);
    assert_eq!(state.result.unwrap().len(), 3);
}

#[tokio::test]
async fn worker_retries_the_outcome_update_and_reports_when_it_gives_up() {
    let fx = TestApp::new();
    let job = stage_upload(&fx, "flaky.png", png_bytes(10, 10), 90).await;
    let job_id = fx.queue.push(job);

    fx.queue.fail_status_updates(2);
    let worker = fx.worker();
    assert!(worker.process_next().await.unwrap());
    assert_eq!(fx.queue.status(&job_id).await.unwrap().status, JobStatus::Succeeded);

    let job = stage_upload(&fx, "flakier.png", png_bytes(10, 10), 90).await;
    fx.queue.push(job);
    fx.queue.fail_status_updates(6);

    assert!(matches!(worker.process_next().await, Err(QueueError::Connection(_))));
    assert_eq!(fx.image_tasks.committed().len(), 8);
}

#[tokio::test]
async fn worker_loops_drain_the_queue_and_stop_on_shutdown() {
    let fx = TestApp::new();
    let mut ids = Vec::new();
    for n in 0..3 {
        let job = stage_upload(&fx, &format!("img{}.png", n), png_bytes(10, 10), 90).await;
        ids.push(fx.queue.push(job));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(fx.worker().run(2, shutdown_rx));

    tokio::time::timeout(Duration::from_secs(10), async {
        while fx.queue.len() > 0 || fx.image_tasks.committed().len() < 12 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    for id in ids {
        assert_eq!(fx.queue.status(&id).await.unwrap().status, JobStatus::Succeeded);
    }
}
