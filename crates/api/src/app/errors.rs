use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use campus_auth::AuthError;
use campus_core::DomainError;

/// Handler result: both arms are ready-made responses, so `?` can short-circuit.
pub type ApiResult = Result<axum::response::Response, axum::response::Response>;

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::Unauthenticated => json_error(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string()),
        AuthError::Forbidden { .. } | AuthError::RoleNotAllowed { .. } => {
            json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::CascadeBlocked { count, reason } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "cascade_blocked",
                "message": reason,
                "count": count,
            })),
        )
            .into_response(),
        DomainError::Internal(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
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
