use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use campus_infra::NewVehicle;
use campus_school::TransportVehicle;

use crate::app::dto::{self, AssignStudentRequest};
use crate::app::errors::{ApiResult, domain_error_to_response};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestSession;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_vehicles).post(create_vehicle))
        .route("/:id", get(get_vehicle))
        .route("/:id/students", post(assign_student))
}

pub async fn list_vehicles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "transport:view")?;
    let vehicles = services
        .records
        .list::<TransportVehicle>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(vehicles).into_response())
}

pub async fn get_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = authz::capability(&ctx, "transport:view")?;
    let id = dto::parse_id(&id)?;
    let vehicle = services
        .records
        .get::<TransportVehicle>(session, id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(vehicle).into_response())
}

pub async fn create_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewVehicle>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "transport:add")?;
    let input = dto::body(body)?;
    let vehicle = services
        .records
        .create_vehicle(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(vehicle)).into_response())
}

pub async fn assign_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    Path(id): Path<String>,
    body: Result<Json<AssignStudentRequest>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "transport:edit")?;
    let id = dto::parse_id(&id)?;
    let req = dto::body(body)?;
    let vehicle = services
        .records
        .assign_student(session, id, req.student_id)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(vehicle).into_response())
}
