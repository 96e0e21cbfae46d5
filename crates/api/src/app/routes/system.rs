use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app::AppServices;
use crate::app::dto::ModuleGrants;
use crate::app::errors::{self, ApiResult};
use crate::authz;
use crate::context::RequestSession;

/// 200 when the process is up and, on Postgres, the database answers.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Response {
    if let Some(db) = &services.db {
        if let Err(e) = db.health_check().await {
            warn!(error = %e, "database health check failed");
            return errors::json_error(StatusCode::SERVICE_UNAVAILABLE, "database_unavailable", e.to_string());
        }
    }
    StatusCode::OK.into_response()
}

/// The caller's identity and resolved permissions for every module.
pub async fn whoami(Extension(ctx): Extension<RequestSession>) -> ApiResult {
    let session = authz::authenticated(&ctx)?;
    let principal = session.principal();

    let permissions: Vec<ModuleGrants> = session
        .effective_permissions()
        .into_iter()
        .map(|(module, grants)| ModuleGrants { module, grants })
        .collect();

    Ok(Json(serde_json::json!({
        "tenant_id": principal.tenant_id.to_string(),
        "user_id": principal.user_id.to_string(),
        "name": principal.name,
        "role": principal.role.as_str(),
        "custom_role": session.custom_role().map(|r| r.name.clone()),
        "permissions": permissions,
    }))
    .into_response())
}
