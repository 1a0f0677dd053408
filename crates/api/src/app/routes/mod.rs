use axum::{
    Router,
    routing::{get, post},
};

pub mod jobs;
pub mod system;

/// Router for every endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/start_job", post(jobs::start_job))
        .route("/status", get(jobs::status))
        .route("/availability", get(system::availability))
        .route("/input_schema", get(system::input_schema))
        .route("/health", get(system::health))
}
