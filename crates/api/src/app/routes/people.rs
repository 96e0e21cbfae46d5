use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use campus_infra::{NewStudent, NewTeacher};
use campus_school::{ParentKind, Student, Teacher};

use crate::app::dto::{self, CascadeResponse};
use crate::app::errors::{ApiResult, domain_error_to_response};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestSession;

pub fn teachers_router() -> Router {
    Router::new()
        .route("/", get(list_teachers).post(create_teacher))
        .route("/:id", get(get_teacher).delete(deactivate_teacher))
        .route("/:id/reactivate", post(reactivate_teacher))
        .route("/:id/cascade", post(recascade_teacher))
}

pub fn students_router() -> Router {
    Router::new()
        .route("/", get(list_students).post(enroll_student))
        .route("/:id", get(get_student).delete(deactivate_student))
        .route("/:id/reactivate", post(reactivate_student))
        .route("/:id/cascade", post(recascade_student))
}

// -------------------------
// Teachers
// -------------------------

pub async fn list_teachers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "teachers:view")?;
    let teachers = services
        .records
        .list::<Teacher>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(teachers).into_response())
}

pub async fn get_teacher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "teachers:view")?;
    let id = dto::parse_id(&id)?;
    let teacher = services
        .records
        .get::<Teacher>(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(teacher).into_response())
}

pub async fn create_teacher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewTeacher>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "teachers:add")?;
    let input = dto::body(body)?;
    let teacher = services
        .records
        .create_teacher(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(teacher)).into_response())
}

/// Soft delete: the teacher is deactivated and its dependents cascade.
pub async fn deactivate_teacher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "teachers:delete")?;
    let id = dto::parse_id(&id)?;
    let cascade = services
        .lifecycle
        .deactivate(session, ParentKind::Teacher, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(CascadeResponse { id, cascade }).into_response())
}

pub async fn reactivate_teacher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "teachers:edit")?;
    let id = dto::parse_id(&id)?;
    services
        .lifecycle
        .reactivate(session, ParentKind::Teacher, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Re-run the cascade of an already deactivated teacher.
pub async fn recascade_teacher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "teachers:delete")?;
    let id = dto::parse_id(&id)?;
    let cascade = services
        .lifecycle
        .recascade(session, ParentKind::Teacher, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(CascadeResponse { id, cascade }).into_response())
}

// -------------------------
// Students
// -------------------------

pub async fn list_students(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "students:view")?;
    let students = services
        .records
        .list::<Student>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(students).into_response())
}

pub async fn get_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "students:view")?;
    let id = dto::parse_id(&id)?;
    let student = services
        .records
        .get::<Student>(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(student).into_response())
}

pub async fn enroll_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewStudent>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "students:add")?;
    let input = dto::body(body)?;
    let student = services
        .records
        .enroll_student(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(student)).into_response())
}

pub async fn deactivate_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "students:delete")?;
    let id = dto::parse_id(&id)?;
    let cascade = services
        .lifecycle
        .deactivate(session, ParentKind::Student, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(CascadeResponse { id, cascade }).into_response())
}

pub async fn reactivate_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "students:edit")?;
    let id = dto::parse_id(&id)?;
    services
        .lifecycle
        .reactivate(session, ParentKind::Student, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn recascade_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "students:delete")?;
    let id = dto::parse_id(&id)?;
    let cascade = services
        .lifecycle
        .recascade(session, ParentKind::Student, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(CascadeResponse { id, cascade }).into_response())
}
