pub mod handlers;

use rocket::data::{ByteUnit, Limits};
use rocket::fs::FileServer;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::{Build, Rocket};
use serde_json::json;
use std::io::Cursor;

use crate::bootstrap::service::AppState;
use crate::common::errors::ServiceError;
use crate::config::AppConfig;
use handlers::resize::generate_resize_routes;
use handlers::synchronous::generate_synchronous_routes;
use handlers::system::generate_system_routes;
use handlers::upload::generate_upload_routes;

#[derive(Debug)]
pub struct AppError {
    pub status: Status,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn from_service(err: ServiceError) -> Self {
        let status = match &err {
            err if err.is_validation() => Status::BadRequest,
            ServiceError::QueueFull | ServiceError::WorkerStopped => Status::ServiceUnavailable,
            _ => Status::InternalServerError,
        };
        let error = match err {
            ServiceError::Storage(inner) => inner,
            other => anyhow::Error::from(other),
        };
        AppError { status, error }
    }

    pub fn not_found(error: anyhow::Error) -> Self {
        AppError {
            status: Status::NotFound,
            error,
        }
    }
}

#[rocket::async_trait]
impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'o> {
        let outer_msg = self.error.to_string();

        let chain: Vec<String> = self.error.chain().map(|e| e.to_string()).collect();

        let body = json!({
            "error": outer_msg,
            "chain": chain,
        })
        .to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl<E> From<E> for AppError
where
    anyhow::Error: From<E>,
{
    fn from(err: E) -> Self {
        AppError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Assemble the HTTP surface around an already-running service.
pub fn build_rocket(state: AppState, config: &AppConfig) -> Rocket<Build> {
    let upload_limit = ByteUnit::Mebibyte(config.upload_limit_mb);
    let limits = Limits::default()
        .limit("file", upload_limit)
        .limit("data-form", upload_limit);

    let figment = rocket::Config::figment()
        .merge(("port", config.port))
        .merge(("limits", limits))
        .merge(("shutdown.ctrlc", false));

    rocket::custom(figment)
        .manage(state)
        .mount(
            config.public_blob_prefix.as_str(),
            FileServer::from(&config.blob_root),
        )
        .mount("/", generate_resize_routes())
        .mount("/", generate_upload_routes())
        .mount("/", generate_synchronous_routes())
        .mount("/", generate_system_routes())
}
