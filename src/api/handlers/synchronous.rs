use anyhow::{Context, anyhow};
use rocket::form::{Errors, Form, FromForm};
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{Route, State, get, post, routes};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::spawn_blocking;

use crate::api::handlers::upload::{form_error, read_upload};
use crate::api::{AppError, AppResult};
use crate::bootstrap::service::AppState;
use crate::common::errors::ServiceError;
use crate::database::schema::task::{TaskRecord, TaskStatus};

#[derive(FromForm, Debug)]
pub struct ResizeUploadForm<'r> {
    #[field(name = "upfile")]
    pub file: TempFile<'r>,
    pub resize: u32,
}

#[derive(Debug, Serialize)]
pub struct ResizedImage {
    original: String,
    resized: String,
}

/// Map a finished task onto the blocking endpoints' response.
fn resized_image(record: TaskRecord) -> AppResult<Json<ResizedImage>> {
    match record.status {
        TaskStatus::Done => {
            let original = record
                .source_file_path
                .ok_or_else(|| anyhow!("finished task has no source path"))?;
            let resized = record
                .resized_file_path
                .ok_or_else(|| anyhow!("finished task has no resized path"))?;
            Ok(Json(ResizedImage { original, resized }))
        }
        TaskStatus::Error => Err(AppError::from(anyhow!(
            "{}",
            record.error.unwrap_or_else(|| "resize failed".to_string())
        ))),
        TaskStatus::InProgress => Err(AppError::from_service(ServiceError::WorkerStopped)),
    }
}

/// Upload an original and wait for its resize.
#[post("/resize?<token>", data = "<form>")]
pub async fn resize_upload(
    state: &State<AppState>,
    token: &str,
    form: Result<Form<ResizeUploadForm<'_>>, Errors<'_>>,
) -> AppResult<Json<ResizedImage>> {
    let inner_form = form.map_err(form_error)?.into_inner();
    state
        .processor
        .check_width(inner_form.resize)
        .map_err(AppError::from_service)?;
    let (name, bytes) = read_upload(&inner_form.file).await?;

    // Step 1: Store the original
    let catalog = Arc::clone(&state.catalog);
    let token = token.to_string();
    let image_reference = name.clone();
    spawn_blocking(move || catalog.upload(&token, &name, &bytes))
        .await
        .context("failed to join upload task")?
        .map_err(AppError::from_service)?;

    // Step 2: Resize through the worker queue
    let record = state
        .processor
        .submit_and_wait(&image_reference, inner_form.resize)
        .await
        .map_err(AppError::from_service)?;
    resized_image(record)
}

/// Resize an already uploaded original and wait for the result.
#[get("/resize-exists?<file>&<resize>")]
pub async fn resize_exists(
    state: &State<AppState>,
    file: &str,
    resize: u32,
) -> AppResult<Json<ResizedImage>> {
    let catalog = Arc::clone(&state.catalog);
    let image_reference = file.to_string();
    let image = spawn_blocking(move || catalog.image(&image_reference))
        .await
        .context("failed to join image lookup")??;
    if image.is_none() {
        return Err(AppError::not_found(anyhow!("image {} not found", file)));
    }

    let record = state
        .processor
        .submit_and_wait(file, resize)
        .await
        .map_err(AppError::from_service)?;
    resized_image(record)
}

pub fn generate_synchronous_routes() -> Vec<Route> {
    routes![resize_upload, resize_exists]
}
