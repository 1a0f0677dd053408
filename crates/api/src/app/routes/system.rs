use axum::Json;
use serde_json::{Value, json};

use crate::app::dto;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn availability() -> Json<Value> {
    Json(dto::availability())
}

pub async fn input_schema() -> Json<Value> {
    Json(dto::input_schema())
}
