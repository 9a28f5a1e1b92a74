use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
};

use crate::app::{Engine, errors};

pub fn router() -> Router {
    Router::new().route("/:sku", get(calculate_atp))
}

pub async fn calculate_atp(
    Extension(engine): Extension<Arc<Engine>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    match engine.calculate_atp(&sku).await {
        Ok(atp) => Json(atp).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
