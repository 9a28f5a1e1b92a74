use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, patch, post, put},
};

use filaforge_core::{JobId, MachineId};
use filaforge_production::{Direction, MachinePatch, NewJob, NewMachine};

use crate::app::{Engine, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(add_machine))
        .route("/:id", patch(update_machine).delete(remove_machine))
        .route("/:id/maintenance", post(complete_maintenance))
        .route("/:id/hours", post(record_hours))
        .route("/:id/jobs", post(enqueue_job))
        .route("/:id/jobs/:job_id", delete(remove_job))
        .route("/:id/jobs/:job_id/move", post(move_job))
        .route("/:id/jobs/:job_id/position", put(set_job_position))
}

pub async fn add_machine(
    Extension(engine): Extension<Arc<Engine>>,
    body: Result<Json<NewMachine>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine.add_machine(&body).await {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn update_machine(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<MachinePatch>, JsonRejection>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine.update_machine(&id, &body).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn remove_machine(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.remove_machine(&id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn complete_maintenance(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine.complete_maintenance(&id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn record_hours(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<dto::RecordHoursRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine
        .record_machine_hours(&id, body.hours)
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn enqueue_job(
    Extension(engine): Extension<Arc<Engine>>,
    Path(id): Path<String>,
    body: Result<Json<NewJob>, JsonRejection>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine.enqueue_job(&id, &body).await {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn remove_job(
    Extension(engine): Extension<Arc<Engine>>,
    Path((id, job_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let job_id: JobId = match super::path_id(&job_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match engine
        .remove_job(&id, &job_id)
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn move_job(
    Extension(engine): Extension<Arc<Engine>>,
    Path((id, job_id)): Path<(String, String)>,
    body: Result<Json<dto::MoveJobRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let job_id: JobId = match super::path_id(&job_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };
    let direction: Direction = match body.direction.parse() {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match engine
        .move_job(
            &id,
            &job_id,
            direction,
        )
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn set_job_position(
    Extension(engine): Extension<Arc<Engine>>,
    Path((id, job_id)): Path<(String, String)>,
    body: Result<Json<dto::JobPositionRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: MachineId = match super::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let job_id: JobId = match super::path_id(&job_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(r) => return errors::json_rejection_to_response(r),
    };

    match engine
        .set_job_position(
            &id,
            &job_id,
            body.position,
        )
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
