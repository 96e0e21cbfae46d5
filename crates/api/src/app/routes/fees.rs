use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use campus_infra::NewFeeStructure;
use campus_school::FeeStructure;

use crate::app::dto;
use crate::app::errors::{ApiResult, domain_error_to_response};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestSession;

pub fn router() -> Router {
    Router::new().route("/", get(list_fee_structures).post(create_fee_structure))
}

pub async fn list_fee_structures(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
) -> ApiResult {
    let session = authz::capability(&ctx, "fees:view")?;
    let fees = services
        .records
        .list::<FeeStructure>(session)
        .await
        .map_err(domain_error_to_response)?;
    Ok(Json(fees).into_response())
}

pub async fn create_fee_structure(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    body: Result<Json<NewFeeStructure>, JsonRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "fees:add")?;
    let input = dto::body(body)?;
    let fee = services
        .records
        .create_fee_structure(session, input)
        .await
        .map_err(domain_error_to_response)?;
    Ok((StatusCode::CREATED, Json(fee)).into_response())
}
