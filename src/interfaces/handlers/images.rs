use actix_multipart::Multipart;
use actix_web::{get, http::header, post, web, HttpResponse, Responder};
use bytes::BytesMut;
use futures_util::StreamExt;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::use_cases::extractors::CurrentUser;
use crate::use_cases::images::UploadedFile;
use crate::AppState;

#[instrument(skip(state, user, payload), fields(user_id = %user.0.id))]
#[post("/upload")]
pub async fn upload(
    state: web::Data<AppState>,
    user: CurrentUser,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let files = read_files(payload, state.max_upload_bytes).await?;
    let results = state.image_handler.upload_all(&user.0, files).await?;

    Ok(HttpResponse::Ok().json(results))
}

/// Collects every file part of the form, in order. Parts without a filename
/// are plain form fields and are skipped.
async fn read_files(mut payload: Multipart, max_bytes: usize) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = payload.next().await {
        let mut field = field?;

        let file_name = match field.content_disposition().and_then(|cd| cd.get_filename()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "{} exceeds the {} byte limit", file_name, max_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }

        files.push(UploadedFile {
            file_name,
            data: data.freeze(),
        });
    }

    Ok(files)
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
#[get("/status/{task_id}")]
pub async fn task_status(
    state: web::Data<AppState>,
    user: CurrentUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let status = state.image_handler.job_status(&user.0, &task_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[instrument(skip(state, user), fields(current_user = %user.0.id))]
#[get("/history/{user_id}")]
pub async fn history(
    state: web::Data<AppState>,
    user: CurrentUser,
    user_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let images = state.image_handler.history(&user.0, &user_id).await?;
    Ok(HttpResponse::Ok().json(images))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
#[get("/task/{task_id}")]
pub async fn download_task(
    state: web::Data<AppState>,
    user: CurrentUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let archive = state.image_handler.task_archive(&user.0, &task_id).await?;

    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", archive.file_name),
        ))
        .body(archive.bytes))
}
