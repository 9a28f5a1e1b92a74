use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use filaforge_core::DomainError;
use filaforge_infra::EngineError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    let status = match &err {
        EngineError::Domain(DomainError::Validation(_)) => StatusCode::BAD_REQUEST,
        EngineError::Domain(DomainError::NotFound(_)) => StatusCode::NOT_FOUND,
        EngineError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
        EngineError::Domain(DomainError::InsufficientStock { .. }) => StatusCode::CONFLICT,
        EngineError::Domain(DomainError::State(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    engine_error_to_response(EngineError::Domain(err))
}

/// Malformed or mistyped JSON bodies are reported like any other validation error.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
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

#[cfg(test)]
mod tests {
    use super::*;
    use filaforge_infra::StoreError;

    #[test]
    fn status_mapping() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::insufficient_stock("S", 10.0, 1.0), StatusCode::CONFLICT),
            (DomainError::state("x"), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }

        let store = engine_error_to_response(StoreError::backend("commit", "down").into());
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
