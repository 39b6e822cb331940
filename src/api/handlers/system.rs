use rocket::serde::json::Json;
use rocket::{Route, State, get, routes};
use serde::Serialize;

use crate::background::worker::WorkerState;
use crate::bootstrap::service::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    worker: WorkerState,
    queued: usize,
    capacity: usize,
}

#[get("/health")]
pub async fn health(state: &State<AppState>) -> Json<Health> {
    let worker = *state.worker_state.borrow();
    Json(Health {
        worker,
        queued: state.processor.queued(),
        capacity: state.processor.capacity(),
    })
}

pub fn generate_system_routes() -> Vec<Route> {
    routes![health]
}
