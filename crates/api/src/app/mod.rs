//! HTTP application wiring (axum router + engine wiring).
//!
//! - `services.rs`: store selection and engine construction
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::Engine;

/// Router over an already constructed engine.
pub fn router(engine: Arc<Engine>) -> Router {
    routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::trace_requests))
            .layer(Extension(engine)),
    )
}

/// Build the full HTTP router (entrypoint used by `main.rs`).
pub async fn build_app(settings: &services::ServiceSettings) -> anyhow::Result<Router> {
    let engine = services::build_engine(settings).await?;
    Ok(router(engine))
}
