use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use docmint_core::JobId;
use docmint_infra::jobs::SubmitJob;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn start_job(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StartJobRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "malformed start_job body");
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "input_data or identifier_from_purchaser is missing, invalid, or does not adhere to the schema",
            );
        }
    };

    let purchaser = body.identifier_from_purchaser.clone();
    let submitted = match services
        .orchestrator
        .submit(SubmitJob {
            purchaser_identifier: body.identifier_from_purchaser,
            input: body.input_data,
        })
        .await
    {
        Ok(s) => s,
        Err(e) => return errors::orchestrator_error_to_response(e),
    };

    Json(dto::StartJobResponse::new(
        submitted.job_id,
        submitted.receipt,
        &services.agent,
        purchaser,
    ))
    .into_response()
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StatusQuery>,
) -> axum::response::Response {
    let Some(raw) = query.job_id else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", "job_id is required");
    };
    // An id we could never have issued is as unknown as a missing one.
    let Ok(job_id) = raw.parse::<JobId>() else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "Job not found");
    };

    match services.status.status(job_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}
