use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use campus_core::DomainError;
use campus_infra::{AuditAction, AuditParams};

use crate::app::dto::{self, AuditLogParams};
use crate::app::errors::{ApiResult, domain_error_to_response};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestSession;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/export", get(export_audit_logs))
}

/// Newest-first audit trail of the caller's tenant.
pub async fn list_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    params: Result<Query<AuditLogParams>, QueryRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "audit_logs:view")?;
    let query = dto::query(params)?.into_query()?;
    let entries = services
        .audit
        .list(session.tenant_id(), &query)
        .await
        .map_err(|e| domain_error_to_response(DomainError::from(e)))?;
    Ok(Json(entries).into_response())
}

/// Same listing as a download; the export itself lands in the trail.
pub async fn export_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestSession>,
    params: Result<Query<AuditLogParams>, QueryRejection>,
) -> ApiResult {
    let session = authz::capability(&ctx, "audit_logs:view")?;
    let query = dto::query(params)?.into_query()?;
    let entries = services
        .audit
        .list(session.tenant_id(), &query)
        .await
        .map_err(|e| domain_error_to_response(DomainError::from(e)))?;

    services.audit.audit(
        AuditParams::by(session, AuditAction::Export, "audit_log", session.tenant_id()).with_metadata(json!({
            "rows": entries.len(),
            "action": query.action.map(|a| a.as_str()),
            "entity_type": query.entity_type,
        })),
    );

    Ok((
        [(axum::http::header::CONTENT_DISPOSITION, "attachment; filename=\"audit-logs.json\"")],
        Json(entries),
    )
        .into_response())
}
