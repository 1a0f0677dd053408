use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use docmint_infra::jobs::{OrchestratorError, RegistryError};
use docmint_payments::GatewayError;

pub fn orchestrator_error_to_response(err: OrchestratorError) -> axum::response::Response {
    match err {
        OrchestratorError::InvalidInput(e) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_input", e.to_string())
        }
        OrchestratorError::Gateway(e) => gateway_error_to_response(e),
        OrchestratorError::Registry(e) => registry_error_to_response(e),
    }
}

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    if err.is_client_error() {
        json_error(StatusCode::BAD_REQUEST, "payment_request_rejected", err.to_string())
    } else {
        json_error(StatusCode::BAD_GATEWAY, "payment_service_error", err.to_string())
    }
}

pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::NotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "Job not found")
        }
        RegistryError::AlreadyExists(_) | RegistryError::Transition(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "registry_error",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
