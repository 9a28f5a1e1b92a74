use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use filaforge_core::FilamentId;
use filaforge_inventory::{NewFilament, NewLot};

use crate::app::{Engine, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_filament))
        .route("/:id", get(get_filament))
        .route("/:id/totals", get(get_totals))
        .route("/:id/adjust", post(adjust_grams))
        .route("/:id/reorder-point", put(update_reorder_point))
        .route("/:id/lots", post(receive_lot))
}

pub async fn create_filament(
    Extension(engine): Extension<Arc<Engine>>,
    body: Result<Json<NewFilament>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine.create_filament(&body).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_filament(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: FilamentId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.filament(&id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_totals(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: FilamentId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.totals(&id).await {
        Ok(totals) => Json(totals).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn adjust_grams(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AdjustGramsRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: FilamentId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine
        .adjust_filament_grams(&id, body.delta)
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn update_reorder_point(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReorderPointRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: FilamentId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine
        .update_reorder_point(&id, body.grams)
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn receive_lot(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<NewLot>, JsonRejection>,
) -> axum::response::Response {
    let id: FilamentId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine.receive_lot(&id, &body).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
