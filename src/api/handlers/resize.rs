use anyhow::anyhow;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{Route, State, get, post, routes};
use serde::{Deserialize, Serialize};

use crate::api::{AppError, AppResult};
use crate::bootstrap::service::AppState;
use crate::database::schema::task::TaskRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeData {
    image_reference: String,
    target_width: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTask {
    task_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    task_id: String,
    #[serde(flatten)]
    record: TaskRecord,
}

#[post("/v2/resize", format = "json", data = "<json_data>")]
pub async fn submit_resize(
    state: &State<AppState>,
    json_data: Result<Json<ResizeData>, json::Error<'_>>,
) -> AppResult<Json<SubmittedTask>> {
    let json_data = json_data.map_err(|e| AppError {
        status: Status::BadRequest,
        error: anyhow!("invalid resize request: {}", e),
    })?;

    let task_id = state
        .processor
        .submit(&json_data.image_reference, json_data.target_width)
        .await
        .map_err(AppError::from_service)?;

    Ok(Json(SubmittedTask {
        task_id: task_id.to_string(),
    }))
}

#[get("/v2/result?<execution>")]
pub async fn task_result(state: &State<AppState>, execution: &str) -> AppResult<Json<TaskResult>> {
    match state.processor.query(execution).await? {
        Some(record) => Ok(Json(TaskResult {
            task_id: execution.to_string(),
            record,
        })),
        None => Err(AppError::not_found(anyhow!("task {} not found", execution))),
    }
}

pub fn generate_resize_routes() -> Vec<Route> {
    routes![submit_resize, task_result]
}
