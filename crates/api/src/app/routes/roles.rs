use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use campus_auth::SystemRole;
use campus_infra::{NewRole, RoleUpdate};

use crate::app::dto;
use crate::app::errors::{ApiResult, domain_error_to_response};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestSession;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).patch(update_role).delete(delete_role))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "roles:view")?;
    let roles = services.roles.list(session).await.map_err(domain_error_to_response)?;
    Ok(Json(roles).into_response())
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "roles:view")?;
    let id = dto::parse_id(&id)?;
    let role = services.roles.get(session, id).await.map_err(domain_error_to_response)?;
    Ok(Json(role).into_response())
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewRole>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "roles:add")?;
    let input = dto::body(body)?;
    let role = services.roles.create(session, input).await.map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(role)).into_response())
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
    body: Result<Json<RoleUpdate>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "roles:edit")?;
    let id = dto::parse_id(&id)?;
    let input = dto::body(body)?;
    let role = services
        .roles
        .update(session, id, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(role).into_response())
}

/// Deleting a role is reserved to the built-in admin role, whatever custom
/// grants say about `roles:delete`.
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::role(&ctx, &[SystemRole::Admin])?;
    let id = dto::parse_id(&id)?;
    services.roles.delete(session, id).await.map_err(domain_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
