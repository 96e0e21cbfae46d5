use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use campus_auth::{Module, PermissionSet};
use campus_core::EntityId;
use campus_infra::{AuditAction, AuditQuery, CascadeSummary};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogParams {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub limit: Option<usize>,
}

impl AuditLogParams {
    pub fn into_query(self) -> Result<AuditQuery, axum::response::Response> {
        let action = match self.action {
            Some(a) => Some(a.parse::<AuditAction>().map_err(|e| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_action", e.to_string())
            })?),
            None => None,
        };
        Ok(AuditQuery {
            action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            ..AuditQuery::default()
        }
        .with_limit(self.limit.unwrap_or(AuditQuery::DEFAULT_LIMIT)))
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignStudentRequest {
    pub student_id: EntityId,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ModuleGrants {
    pub module: Module,
    #[serde(flatten)]
    pub grants: PermissionSet,
}

#[derive(Debug, Serialize)]
pub struct CascadeResponse {
    pub id: EntityId,
    pub cascade: CascadeSummary,
}

// -------------------------
// Helpers
// -------------------------

/// Unwrap a JSON body extracted as `Result` so the guard runs before body errors surface.
pub fn body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()))
}

pub fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, axum::response::Response> {
    query
        .map(|Query(value)| value)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()))
}

pub fn parse_id(raw: &str) -> Result<EntityId, axum::response::Response> {
    raw.parse::<EntityId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
