use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use campus_infra::{NewDepartment, NewSubject, NewWorkload, SubjectUpdate};
use campus_school::{Department, FacultyWorkload, ParentKind, Subject};

use crate::app::dto::{self, CascadeResponse};
use crate::app::errors::{ApiResult, domain_error_to_response};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestSession;

pub fn departments_router() -> Router {
    Router::new()
        .route("/", get(list_departments).post(create_department))
        .route("/:id", get(get_department).delete(delete_department))
        .route("/:id/cascade", post(recascade_department))
}

pub fn subjects_router() -> Router {
    Router::new()
        .route("/", get(list_subjects).post(create_subject))
        .route("/:id", get(get_subject).patch(update_subject).delete(deactivate_subject))
        .route("/:id/reactivate", post(reactivate_subject))
}

pub fn workloads_router() -> Router {
    Router::new().route("/", get(list_workloads).post(create_workload))
}

// -------------------------
// Departments
// -------------------------

pub async fn list_departments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "departments:view")?;
    let departments = services
        .records
        .list::<Department>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(departments).into_response())
}

pub async fn get_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "departments:view")?;
    let id = dto::parse_id(&id)?;
    let department = services
        .records
        .get::<Department>(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(department).into_response())
}

pub async fn create_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewDepartment>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "departments:add")?;
    let input = dto::body(body)?;
    let department = services
        .records
        .create_department(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(department)).into_response())
}

/// Hard delete, refused with 409 while active subjects still reference it.
pub async fn delete_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "departments:delete")?;
    let id = dto::parse_id(&id)?;
    let cascade = services
        .lifecycle
        .delete_department(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(CascadeResponse { id, cascade }).into_response())
}

/// Finish clearing references to a deleted department.
pub async fn recascade_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "departments:delete")?;
    let id = dto::parse_id(&id)?;
    let cascade = services
        .lifecycle
        .recascade(session, ParentKind::Department, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(CascadeResponse { id, cascade }).into_response())
}

// -------------------------
// Subjects
// -------------------------

pub async fn list_subjects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "subjects:view")?;
    let subjects = services
        .records
        .list::<Subject>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(subjects).into_response())
}

pub async fn get_subject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "subjects:view")?;
    let id = dto::parse_id(&id)?;
    let subject = services
        .records
        .get::<Subject>(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(subject).into_response())
}

pub async fn create_subject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewSubject>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "subjects:add")?;
    let input = dto::body(body)?;
    let subject = services
        .records
        .create_subject(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(subject)).into_response())
}

pub async fn update_subject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
    body: Result<Json<SubjectUpdate>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "subjects:edit")?;
    let id = dto::parse_id(&id)?;
    let input = dto::body(body)?;
    let subject = services
        .records
        .update_subject(session, id, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(subject).into_response())
}

/// Soft delete; an inactive subject no longer blocks its department's delete.
pub async fn deactivate_subject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "subjects:delete")?;
    let id = dto::parse_id(&id)?;
    let subject = services
        .lifecycle
        .deactivate_subject(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(subject).into_response())
}

pub async fn reactivate_subject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "subjects:edit")?;
    let id = dto::parse_id(&id)?;
    let subject = services
        .lifecycle
        .reactivate_subject(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(subject).into_response())
}

// -------------------------
// Faculty workload
// -------------------------

pub async fn list_workloads(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "workload:view")?;
    let workloads = services
        .records
        .list::<FacultyWorkload>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(workloads).into_response())
}

pub async fn create_workload(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewWorkload>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "workload:add")?;
    let input = dto::body(body)?;
    let workload = services
        .records
        .create_workload(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(workload)).into_response())
}
