use anyhow::{Context, anyhow};
use rocket::form::{Errors, Form, FromForm};
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State, get, post, routes};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::task::spawn_blocking;
use uuid::Uuid;

use crate::api::{AppError, AppResult};
use crate::bootstrap::service::AppState;
use crate::database::schema::user_image::UserImageWithResizes;

#[derive(FromForm, Debug)]
pub struct UploadForm<'r> {
    #[field(name = "upfile")]
    pub file: TempFile<'r>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    image_reference: String,
    file_path: String,
}

#[derive(Debug, Serialize)]
pub struct IssuedToken {
    token: String,
}

/// Client-supplied file name, reduced to its final path component.
fn get_filename(file: &TempFile<'_>) -> Option<String> {
    let raw = file.raw_name()?.dangerous_unsafe_unsanitized_raw().as_str();
    Path::new(raw)
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
}

/// Turn multipart parse failures into one 400 with the field errors chained.
pub(crate) fn form_error(errors: Errors<'_>) -> AppError {
    let error_chain = errors
        .iter()
        .map(|e| anyhow!(e.to_string()))
        .reduce(|acc, e| acc.context(e.to_string()));

    let error = match error_chain {
        Some(chain) => chain.context("Failed to parse form"),
        None => anyhow!("Failed to parse form with unknown error"),
    };
    AppError {
        status: Status::BadRequest,
        error,
    }
}

/// Name and contents of an uploaded file.
pub(crate) async fn read_upload(file: &TempFile<'_>) -> AppResult<(String, Vec<u8>)> {
    let name = get_filename(file).ok_or_else(|| AppError {
        status: Status::BadRequest,
        error: anyhow!("uploaded file has no name"),
    })?;

    let mut bytes = Vec::new();
    let reader = file.open().await.context("failed to open uploaded file")?;
    tokio::pin!(reader);
    reader
        .read_to_end(&mut bytes)
        .await
        .context("failed to read uploaded file")?;
    Ok((name, bytes))
}

#[post("/v2/upload?<token>", data = "<form>")]
pub async fn upload(
    state: &State<AppState>,
    token: &str,
    form: Result<Form<UploadForm<'_>>, Errors<'_>>,
) -> AppResult<Json<UploadedImage>> {
    let inner_form = form.map_err(form_error)?.into_inner();
    let (name, bytes) = read_upload(&inner_form.file).await?;

    let catalog = Arc::clone(&state.catalog);
    let token = token.to_string();
    let image_reference = name.clone();
    let file_path = spawn_blocking(move || catalog.upload(&token, &name, &bytes))
        .await
        .context("failed to join upload task")?
        .map_err(AppError::from_service)?;

    Ok(Json(UploadedImage {
        image_reference,
        file_path,
    }))
}

#[get("/v2/files?<token>")]
pub async fn files(state: &State<AppState>, token: &str) -> AppResult<Json<Vec<UserImageWithResizes>>> {
    let catalog = Arc::clone(&state.catalog);
    let token = token.to_string();
    let files = spawn_blocking(move || catalog.files(&token))
        .await
        .context("failed to join file listing")??;
    Ok(Json(files))
}

#[get("/token")]
pub async fn issue_token() -> Json<IssuedToken> {
    Json(IssuedToken {
        token: Uuid::new_v4().to_string(),
    })
}

pub fn generate_upload_routes() -> Vec<Route> {
    routes![upload, files, issue_token]
}
