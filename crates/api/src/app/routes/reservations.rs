use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};

use filaforge_core::OrderId;

use crate::app::{Engine, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:order_id", post(reserve).get(get_reservation))
        .route("/:order_id/consume", post(consume))
        .route("/:order_id/release", post(release))
}

pub async fn reserve(
    Extension(engine): Extension<Arc<Engine>>,
    Path(raw): Path<String>,
    body: Result<Json<dto::ReserveRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };
    let order_id: OrderId = match super::path_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match engine.reserve(&order_id, &body.items).await {
        Ok(allocations) => Json(dto::ReserveResponse {
            order_id: order_id.to_string(),
            allocations,
        })
        .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_reservation(
    Extension(engine): Extension<Arc<Engine>>,
    Path(raw): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match super::path_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match engine.reservation(&order_id).await {
        Ok(r) => Json(r).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn consume(
    Extension(engine): Extension<Arc<Engine>>,
    Path(raw): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match super::path_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match engine.consume(&order_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn release(
    Extension(engine): Extension<Arc<Engine>>,
    Path(raw): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match super::path_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match engine.release(&order_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
