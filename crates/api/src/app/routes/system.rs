use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::{Engine, errors};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn snapshot(Extension(engine): Extension<Arc<Engine>>) -> axum::response::Response {
    Json(engine.snapshot().await).into_response()
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}
