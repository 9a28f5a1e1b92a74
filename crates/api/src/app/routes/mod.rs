use std::str::FromStr;

use axum::{Router, response::Response, routing::get};

use filaforge_core::DomainError;

use crate::app::errors;

pub mod atp;
pub mod filaments;
pub mod machines;
pub mod reservations;
pub mod system;

/// Router for every endpoint; handlers expect the engine as an `Extension`.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/snapshot", get(system::snapshot))
        .nest("/filaments", filaments::router())
        .nest("/machines", machines::router())
        .nest("/reservations", reservations::router())
        .nest("/atp", atp::router())
        .fallback(system::not_found)
}

/// Typed id from a path segment, trimmed and validated the same way ids are
/// when entities are created.
pub(crate) fn path_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}
